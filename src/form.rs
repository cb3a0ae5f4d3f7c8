// 📝 Form data - submitted fields and files, independent of the HTTP layer

/// A file field from a multipart submission
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: String,
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Browsers submit an empty part (sometimes named "undefined") when no
    /// file was picked.
    pub fn is_present(&self) -> bool {
        !self.bytes.is_empty() && !self.file_name.is_empty() && self.file_name != "undefined"
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Extension after the last dot, lower-cased; `bin` when there is none
    pub fn extension(&self) -> String {
        match self.file_name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext.to_lowercase(),
            _ => "bin".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormData {
    fields: Vec<(String, String)>,
    files: Vec<(String, UploadedFile)>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        FormData {
            fields: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
            files: Vec::new(),
        }
    }

    pub fn push_field(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.fields.push((name.into(), value.into()));
    }

    pub fn push_file(&mut self, name: impl Into<String>, file: UploadedFile) {
        self.files.push((name.into(), file));
    }

    pub fn with_file(mut self, name: &str, file: UploadedFile) -> Self {
        self.push_file(name, file);
        self
    }

    /// First raw value of a field
    pub fn get(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    /// Trimmed value; `None` for missing or blank fields
    pub fn text(&self, name: &str) -> Option<String> {
        self.get(name)
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    /// Trimmed value or the empty string
    pub fn text_or_empty(&self, name: &str) -> String {
        self.text(name).unwrap_or_default()
    }

    /// Every value of a repeated field, in submission order
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// A file field that actually carries content
    pub fn file(&self, name: &str) -> Option<&UploadedFile> {
        self.files
            .iter()
            .find(|(k, f)| k == name && f.is_present())
            .map(|(_, f)| f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text_trims_and_drops_blank() {
        let form = FormData::from_pairs([("name", "  Ana  "), ("email", "   ")]);
        assert_eq!(form.text("name").as_deref(), Some("Ana"));
        assert_eq!(form.text("email"), None);
        assert_eq!(form.text("missing"), None);
        assert_eq!(form.get("email"), Some("   "));
    }

    #[test]
    fn test_repeated_fields() {
        let form = FormData::from_pairs([("amount", "10"), ("amount", "20")]);
        assert_eq!(form.all("amount"), vec!["10", "20"]);
        assert_eq!(form.get("amount"), Some("10"));
    }

    #[test]
    fn test_empty_file_is_not_present() {
        let empty = UploadedFile {
            file_name: "undefined".to_string(),
            content_type: "application/octet-stream".to_string(),
            bytes: vec![1],
        };
        let form = FormData::new().with_file("photo", empty);
        assert!(form.file("photo").is_none());
    }

    #[test]
    fn test_extension() {
        let file = UploadedFile {
            file_name: "Foto.Perfil.JPG".to_string(),
            content_type: "image/jpeg".to_string(),
            bytes: vec![1, 2],
        };
        assert_eq!(file.extension(), "jpg");

        let bare = UploadedFile {
            file_name: "foto".to_string(),
            ..file
        };
        assert_eq!(bare.extension(), "bin");
    }
}
