// 🧾 Report - CSV export of a filtered transaction list
//
// Columns: date, type, category, description, member, amount.
// Three summary rows follow the data rows.

use crate::entities::TransactionView;
use crate::error::Result;
use crate::filters::totals_of;
use std::io::Write;

pub const REPORT_HEADER: [&str; 6] = ["Data", "Tipo", "Categoria", "Descrição", "Membro", "Valor"];

fn money(value: f64) -> String {
    format!("{:.2}", value)
}

/// Write the report to any writer (file, stdout, response body)
pub fn write_report<W: Write>(out: W, views: &[TransactionView]) -> Result<()> {
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(REPORT_HEADER)?;

    for view in views {
        let t = &view.transaction;
        writer.write_record([
            t.date.format("%Y-%m-%d").to_string(),
            t.kind.label().to_string(),
            t.category.clone(),
            t.description.clone(),
            view.member_name.clone().unwrap_or_default(),
            money(t.amount),
        ])?;
    }

    let totals = totals_of(views);
    for (label, value) in [
        ("Total Entradas", totals.income),
        ("Total Saídas", totals.expense),
        ("Saldo do Período", totals.balance),
    ] {
        let amount = money(value);
        writer.write_record([label, "", "", "", "", amount.as_str()])?;
    }

    writer.flush()?;
    Ok(())
}

pub fn report_csv(views: &[TransactionView]) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    write_report(&mut buffer, views)?;
    Ok(buffer)
}

/// `relatorio-financeiro-YYYY-MM-DD.csv`
pub fn report_file_name(today: chrono::NaiveDate) -> String {
    format!("relatorio-financeiro-{}.csv", today.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{Transaction, TransactionType};
    use chrono::NaiveDate;

    fn view(kind: TransactionType, amount: f64, member: Option<&str>) -> TransactionView {
        TransactionView {
            transaction: Transaction {
                id: "t1".to_string(),
                church_id: "c1".to_string(),
                kind,
                category: "Dizimo".to_string(),
                amount,
                date: NaiveDate::from_ymd_opt(2024, 5, 3).unwrap(),
                description: "Culto, noite".to_string(),
                member_id: None,
                created_at: None,
                updated_at: None,
            },
            member_name: member.map(str::to_string),
        }
    }

    #[test]
    fn test_report_rows_and_totals() {
        let views = vec![
            view(TransactionType::Income, 150.0, Some("Ana")),
            view(TransactionType::Expense, 40.5, None),
        ];
        let csv_text = String::from_utf8(report_csv(&views).unwrap()).unwrap();
        let lines: Vec<&str> = csv_text.lines().collect();

        assert_eq!(lines[0], "Data,Tipo,Categoria,Descrição,Membro,Valor");
        assert_eq!(lines[1], "2024-05-03,Entrada,Dizimo,\"Culto, noite\",Ana,150.00");
        assert_eq!(lines[2], "2024-05-03,Saída,Dizimo,\"Culto, noite\",,40.50");
        assert_eq!(lines[3], "Total Entradas,,,,,150.00");
        assert_eq!(lines[4], "Total Saídas,,,,,40.50");
        assert_eq!(lines[5], "Saldo do Período,,,,,109.50");
    }

    #[test]
    fn test_empty_report_still_has_totals() {
        let csv_text = String::from_utf8(report_csv(&[]).unwrap()).unwrap();
        assert_eq!(csv_text.lines().count(), 4);
        assert!(csv_text.ends_with("Saldo do Período,,,,,0.00\n"));
    }

    #[test]
    fn test_file_name() {
        let day = NaiveDate::from_ymd_opt(2024, 5, 3).unwrap();
        assert_eq!(report_file_name(day), "relatorio-financeiro-2024-05-03.csv");
    }
}
