// 🏷️ Category - fixed set of transaction categories
//
// The category list is closed: transactions may only be written with one of
// these values. Stored rows keep the category as text so that legacy rows
// written before the list was enforced can still be read.

use serde::{Deserialize, Serialize};

// ============================================================================
// TRANSACTION TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    /// Money coming in (tithes, offerings)
    Income,

    /// Money going out (bills, maintenance)
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Income => "income",
            TransactionType::Expense => "expense",
        }
    }

    pub fn parse(raw: &str) -> Option<TransactionType> {
        match raw.trim() {
            "income" => Some(TransactionType::Income),
            "expense" => Some(TransactionType::Expense),
            _ => None,
        }
    }

    /// Portuguese label used by reports
    pub fn label(&self) -> &'static str {
        match self {
            TransactionType::Income => "Entrada",
            TransactionType::Expense => "Saída",
        }
    }
}

// ============================================================================
// CATEGORY
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Oferta")]
    Oferta,
    #[serde(rename = "Oferta missionaria")]
    OfertaMissionaria,
    #[serde(rename = "Dizimo")]
    Dizimo,
    #[serde(rename = "Construção")]
    Construcao,
    #[serde(rename = "Manutenção")]
    Manutencao,
    #[serde(rename = "Oferta solidaria")]
    OfertaSolidaria,
    #[serde(rename = "Agua")]
    Agua,
    #[serde(rename = "Luz")]
    Luz,
    #[serde(rename = "Telefone")]
    Telefone,
    #[serde(rename = "Pastoral")]
    Pastoral,
    #[serde(rename = "Diversas")]
    Diversas,
}

impl Category {
    /// All categories in display order
    pub const ALL: [Category; 11] = [
        Category::Oferta,
        Category::OfertaMissionaria,
        Category::Dizimo,
        Category::Construcao,
        Category::Manutencao,
        Category::OfertaSolidaria,
        Category::Agua,
        Category::Luz,
        Category::Telefone,
        Category::Pastoral,
        Category::Diversas,
    ];

    /// Stored value; matches the text persisted in the `category` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Oferta => "Oferta",
            Category::OfertaMissionaria => "Oferta missionaria",
            Category::Dizimo => "Dizimo",
            Category::Construcao => "Construção",
            Category::Manutencao => "Manutenção",
            Category::OfertaSolidaria => "Oferta solidaria",
            Category::Agua => "Agua",
            Category::Luz => "Luz",
            Category::Telefone => "Telefone",
            Category::Pastoral => "Pastoral",
            Category::Diversas => "Diversas",
        }
    }

    /// Exact match against the stored values (no case folding).
    pub fn parse(raw: &str) -> Option<Category> {
        Category::ALL.iter().copied().find(|c| c.as_str() == raw)
    }

    /// Categories summarized in the dashboard income breakdown
    pub fn breakdown() -> [Category; 3] {
        [Category::Dizimo, Category::Oferta, Category::OfertaMissionaria]
    }

    /// Plural label used by the income breakdown cards
    pub fn breakdown_label(&self) -> &'static str {
        match self {
            Category::Dizimo => "Dízimos",
            Category::Oferta => "Ofertas",
            Category::OfertaMissionaria => "Ofertas Missionárias",
            other => other.as_str(),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
