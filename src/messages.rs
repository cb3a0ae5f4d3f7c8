// 💬 Messages - Portuguese text for the outcome codes carried in redirects

use crate::session::Page;
use serde::Serialize;
use std::collections::HashMap;

const FORBIDDEN: &str = "Você não tem permissão para realizar esta ação.";

const DASHBOARD_ERRORS: &[(&str, &str)] = &[
    ("transaction", "Erro ao salvar a transação."),
    ("server", "Erro inesperado ao criar transação."),
    ("partial", "Algumas transações não puderam ser salvas."),
    ("forbidden", FORBIDDEN),
];

const TRANSACTION_ERRORS: &[(&str, &str)] = &[
    ("invalid_amount", "O valor deve ser diferente de zero."),
    ("invalid_date", "Informe uma data válida."),
    ("invalid_category", "Categoria inválida."),
    ("invalid_type", "Tipo de transação inválido."),
    ("invalid_member", "Membro não encontrado na sua igreja."),
    ("not_found", "Transação não encontrada."),
    ("db", "Erro ao salvar a transação no banco."),
    ("server", "Erro inesperado no servidor."),
    ("forbidden", FORBIDDEN),
];

const MEMBER_ERRORS: &[(&str, &str)] = &[
    ("duplicate", "Este e-mail já está cadastrado como membro da sua igreja."),
    ("db", "Erro ao salvar o membro na tabela."),
    ("db_check", "Erro ao checar duplicidade no banco."),
    ("family", "Erro ao criar a família."),
    ("missing_id", "Membro não informado."),
    ("not_found", "Membro não encontrado."),
    ("server", "Erro inesperado no servidor durante a criação do membro."),
    ("forbidden", FORBIDDEN),
];

const USER_ERRORS: &[(&str, &str)] = &[
    ("duplicate", "Este e-mail já está cadastrado para sua igreja."),
    ("auth_id", "Não foi possível obter o ID do usuário Auth."),
    ("auth_create", "Erro ao criar usuário no Auth."),
    ("db", "Erro ao salvar o usuário na tabela users."),
    ("db_check", "Erro ao checar duplicidade no banco."),
    ("password_length", "A senha deve ter pelo menos 6 caracteres."),
    ("password_mismatch", "As senhas não coincidem."),
    ("email_required", "Informe o e-mail do usuário."),
    ("self_delete", "Você não pode excluir sua própria conta."),
    ("not_found", "Usuário não encontrado."),
    ("server", "Erro inesperado no servidor durante a criação do usuário."),
    ("forbidden", FORBIDDEN),
];

const SETTINGS_ERRORS: &[(&str, &str)] = &[
    ("db", "Erro ao salvar as configurações da igreja."),
    ("name_required", "O nome da igreja é obrigatório."),
    ("invalid_color", "As cores devem estar no formato #RRGGBB."),
    ("logo_missing", "Nenhum arquivo enviado."),
    ("logo_too_large", "O logo deve ter no máximo 5 MB."),
    ("logo_type", "Formato de imagem não suportado. Use PNG, JPEG, GIF ou WEBP."),
    ("storage", "Erro ao enviar o logo."),
    ("forbidden", FORBIDDEN),
];

const LOGIN_ERRORS: &[(&str, &str)] = &[("auth", "E-mail ou senha inválidos.")];

const REGISTER_ERRORS: &[(&str, &str)] = &[
    ("password_length", "A senha deve ter pelo menos 6 caracteres."),
    ("password_mismatch", "As senhas não coincidem."),
    ("email_required", "Informe o e-mail."),
    ("auth", "Erro ao criar a conta."),
    ("church", "Erro ao criar a igreja."),
    ("profile", "Erro ao criar o perfil do usuário."),
];

fn error_dictionary(page: Page) -> (&'static [(&'static str, &'static str)], &'static str) {
    match page {
        Page::Dashboard | Page::QuickEntry => (DASHBOARD_ERRORS, "Ocorreu um erro ao salvar."),
        Page::Transactions => (TRANSACTION_ERRORS, "Ocorreu um erro ao salvar a transação."),
        Page::Members => (MEMBER_ERRORS, "Ocorreu um erro ao criar o membro."),
        Page::Users => (USER_ERRORS, "Ocorreu um erro ao criar o usuário."),
        Page::Settings => (SETTINGS_ERRORS, "Ocorreu um erro ao salvar as configurações."),
        Page::Login => (LOGIN_ERRORS, "Erro de autenticação."),
        Page::Register => (REGISTER_ERRORS, "Erro ao criar a conta."),
    }
}

/// Message for an error code, with the page's generic fallback
pub fn error_message(page: Page, code: &str) -> &'static str {
    let (entries, fallback) = error_dictionary(page);
    entries
        .iter()
        .find(|(k, _)| *k == code)
        .map(|(_, message)| *message)
        .unwrap_or(fallback)
}

fn success_message(page: Page, flag: &str, count: Option<u32>) -> Option<String> {
    let message = match (page, flag) {
        (Page::Dashboard | Page::QuickEntry, "saved") => match count {
            Some(n) if n > 1 => format!("{} transações salvas com sucesso.", n),
            _ => "Transação salva com sucesso.".to_string(),
        },
        (Page::Transactions, "saved") => "Transação salva com sucesso.".to_string(),
        (Page::Transactions, "updated") => "Transação atualizada com sucesso.".to_string(),
        (Page::Transactions, "deleted") => "Transação excluída com sucesso.".to_string(),
        (Page::Members, "saved") => "Membro criado com sucesso.".to_string(),
        (Page::Members, "updated") => "Membro atualizado com sucesso.".to_string(),
        (Page::Members, "deleted") => "Membro excluído com sucesso.".to_string(),
        (Page::Users, "saved") => "Usuário criado com sucesso e senha definida.".to_string(),
        (Page::Users, "updated") => "Usuário atualizado com sucesso.".to_string(),
        (Page::Users, "deleted") => "Usuário excluído com sucesso.".to_string(),
        (Page::Settings, "success") => "Configurações salvas com sucesso!".to_string(),
        _ => return None,
    };
    Some(message)
}

// ============================================================================
// FLASH
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FlashKind {
    Success,
    Error,
}

/// Banner shown at the top of a page after a redirect
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub message: String,
}

/// Read the outcome parameters of a page's query string. Errors win.
pub fn flash_from_query(page: Page, query: &HashMap<String, String>) -> Option<Flash> {
    if let Some(code) = query.get("error").filter(|c| !c.is_empty()) {
        return Some(Flash {
            kind: FlashKind::Error,
            code: Some(code.clone()),
            message: error_message(page, code).to_string(),
        });
    }

    ["saved", "updated", "deleted", "success"]
        .iter()
        .filter_map(|flag| query.get(*flag).map(|v| (*flag, v)))
        .find_map(|(flag, value)| {
            success_message(page, flag, value.parse().ok()).map(|message| Flash {
                kind: FlashKind::Success,
                code: None,
                message,
            })
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;

    fn query(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_known_and_unknown_codes() {
        assert_eq!(
            error_message(Page::Users, "password_length"),
            "A senha deve ter pelo menos 6 caracteres."
        );
        assert_eq!(
            error_message(Page::Members, "invite"),
            "Ocorreu um erro ao criar o membro."
        );
    }

    #[test]
    fn test_every_transaction_code_has_text() {
        let codes = [
            ErrorCode::InvalidAmount,
            ErrorCode::InvalidDate,
            ErrorCode::InvalidCategory,
            ErrorCode::InvalidType,
            ErrorCode::InvalidMember,
            ErrorCode::NotFound,
            ErrorCode::Db,
            ErrorCode::Server,
        ];
        let (_, fallback) = error_dictionary(Page::Transactions);
        for code in codes {
            assert_ne!(error_message(Page::Transactions, code.as_str()), fallback);
        }
    }

    #[test]
    fn test_flash_error_wins() {
        let flash =
            flash_from_query(Page::Members, &query(&[("saved", "1"), ("error", "duplicate")]))
                .unwrap();
        assert_eq!(flash.kind, FlashKind::Error);
        assert_eq!(flash.code.as_deref(), Some("duplicate"));
    }

    #[test]
    fn test_flash_success_counts() {
        let flash = flash_from_query(Page::Dashboard, &query(&[("saved", "3")])).unwrap();
        assert_eq!(flash.message, "3 transações salvas com sucesso.");

        let flash = flash_from_query(Page::Settings, &query(&[("success", "1")])).unwrap();
        assert_eq!(flash.message, "Configurações salvas com sucesso!");

        assert!(flash_from_query(Page::Users, &query(&[])).is_none());
    }
}
