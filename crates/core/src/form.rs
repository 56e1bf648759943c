//! Validation of the "add game" form.

use reqwest::Url;

use crate::{error::ValidationError, models::GameRecord};

/// Description stored when the field is left blank.
pub const DEFAULT_DESCRIPTION: &str = "No description.";

/// Editable fields of the form.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    /// Game name.
    Name,
    /// Disc serial code.
    Code,
    /// Size in GB.
    Size,
    /// Free-text description.
    Description,
    /// Cover image link.
    CoverUrl,
}

impl FormField {
    /// Fields in display order.
    pub const ALL: [FormField; 5] = [
        FormField::Name,
        FormField::Code,
        FormField::Size,
        FormField::Description,
        FormField::CoverUrl,
    ];

    /// Label shown next to the input.
    pub fn label(self) -> &'static str {
        match self {
            FormField::Name => "Name",
            FormField::Code => "Code",
            FormField::Size => "Size (GB)",
            FormField::Description => "Description",
            FormField::CoverUrl => "Cover URL",
        }
    }
}

/// Raw text typed into the form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewGameForm {
    name: String,
    code: String,
    size: String,
    description: String,
    cover_url: String,
}

impl NewGameForm {
    /// Current text of a field.
    pub fn value(&self, field: FormField) -> &str {
        match field {
            FormField::Name => &self.name,
            FormField::Code => &self.code,
            FormField::Size => &self.size,
            FormField::Description => &self.description,
            FormField::CoverUrl => &self.cover_url,
        }
    }

    /// Replace a field's text, applying its input mask.
    pub fn set(&mut self, field: FormField, value: &str) {
        match field {
            FormField::Name => self.name = value.to_string(),
            FormField::Code => self.code = value.to_uppercase(),
            FormField::Size => {
                self.size = value
                    .chars()
                    .filter(|ch| ch.is_ascii_digit() || *ch == '.')
                    .collect()
            }
            FormField::Description => self.description = value.to_string(),
            FormField::CoverUrl => self.cover_url = value.to_string(),
        }
    }

    /// Append a character to a field.
    pub fn push(&mut self, field: FormField, ch: char) {
        let mut value = self.value(field).to_string();
        value.push(ch);
        self.set(field, &value);
    }

    /// Remove the last character of a field.
    pub fn pop(&mut self, field: FormField) {
        let mut value = self.value(field).to_string();
        value.pop();
        self.set(field, &value);
    }

    /// Check the form and build the record to insert.
    pub fn validate(&self) -> Result<GameRecord, ValidationError> {
        let name = self.name.trim();
        let code = self.code.trim();
        let size = self.size.trim();

        let missing: Vec<&'static str> = [
            (FormField::Name, name),
            (FormField::Code, code),
            (FormField::Size, size),
        ]
        .into_iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| field.label())
        .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingFields(missing));
        }

        let cover_url = self.cover_url.trim();
        if !cover_url.is_empty() && !is_http_url(cover_url) {
            return Err(ValidationError::InvalidUrl);
        }

        let size_gb = parse_size(size).ok_or(ValidationError::InvalidSize)?;

        let description = match self.description.trim() {
            "" => DEFAULT_DESCRIPTION.to_string(),
            text => text.to_string(),
        };

        Ok(GameRecord {
            name: name.to_string(),
            size_gb,
            codes: vec![code.to_string()],
            description: Some(description),
            cover_url: (!cover_url.is_empty()).then(|| cover_url.to_string()),
        })
    }
}

/// Read the leading decimal number, ignoring anything after a second dot.
fn parse_size(value: &str) -> Option<f64> {
    let end = value
        .char_indices()
        .filter(|(_, ch)| *ch == '.')
        .nth(1)
        .map_or(value.len(), |(idx, _)| idx);
    value[..end]
        .parse::<f64>()
        .ok()
        .filter(|size| size.is_finite())
}

fn is_http_url(value: &str) -> bool {
    Url::parse(value)
        .map(|url| matches!(url.scheme(), "http" | "https"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filled() -> NewGameForm {
        let mut form = NewGameForm::default();
        form.set(FormField::Name, "  God of War II (USA) ");
        form.set(FormField::Code, "scus-97481");
        form.set(FormField::Size, "7.95 GB");
        form
    }

    #[test]
    fn input_masks_apply() {
        let form = filled();
        assert_eq!(form.value(FormField::Code), "SCUS-97481");
        assert_eq!(form.value(FormField::Size), "7.95");

        let mut form = NewGameForm::default();
        for ch in "4a,3x7".chars() {
            form.push(FormField::Size, ch);
        }
        assert_eq!(form.value(FormField::Size), "437");
        form.pop(FormField::Size);
        assert_eq!(form.value(FormField::Size), "43");
    }

    #[test]
    fn builds_trimmed_record() -> Result<(), ValidationError> {
        let record = filled().validate()?;
        assert_eq!(record.name, "God of War II (USA)");
        assert_eq!(record.codes, vec!["SCUS-97481".to_string()]);
        assert_eq!(record.size_gb, 7.95);
        assert_eq!(record.description.as_deref(), Some(DEFAULT_DESCRIPTION));
        assert_eq!(record.cover_url, None);
        Ok(())
    }

    #[test]
    fn reports_missing_fields() {
        let mut form = NewGameForm::default();
        form.set(FormField::Name, "Okami");
        assert_eq!(
            form.validate(),
            Err(ValidationError::MissingFields(vec!["Code", "Size (GB)"]))
        );
    }

    #[test]
    fn rejects_bad_url_and_size() {
        let mut form = filled();
        form.set(FormField::CoverUrl, "ftp://covers.example/gow2.png");
        assert_eq!(form.validate(), Err(ValidationError::InvalidUrl));
        form.set(FormField::CoverUrl, "not a url");
        assert_eq!(form.validate(), Err(ValidationError::InvalidUrl));
        form.set(FormField::CoverUrl, "https://covers.example/gow2.png");
        assert!(form.validate().is_ok());

        form.set(FormField::Size, ".");
        assert_eq!(form.validate(), Err(ValidationError::InvalidSize));
    }

    #[test]
    fn size_uses_leading_number() -> Result<(), ValidationError> {
        let mut form = filled();
        form.set(FormField::Size, "4.37.1");
        assert_eq!(form.validate()?.size_gb, 4.37);
        form.set(FormField::Size, ".5");
        assert_eq!(form.validate()?.size_gb, 0.5);
        form.set(FormField::Size, "12.");
        assert_eq!(form.validate()?.size_gb, 12.0);
        Ok(())
    }
}
