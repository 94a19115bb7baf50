use crate::api::errors::ApiError;
use crate::workflow::intake::DocumentRole;

pub(crate) fn parse_document_role(value: &str) -> Result<DocumentRole, ApiError> {
    DocumentRole::parse(value).ok_or_else(|| {
        ApiError::BadRequest(format!("Unknown document role '{value}', expected student or key"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_roles_parse() {
        assert!(matches!(parse_document_role("student"), Ok(DocumentRole::Student)));
        assert!(matches!(parse_document_role("key"), Ok(DocumentRole::Key)));
    }

    #[test]
    fn unknown_role_is_rejected() {
        assert!(parse_document_role("answer-sheet").is_err());
    }
}
