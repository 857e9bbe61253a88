use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum SectionBody {
    /// Key/value pairs in insertion order. Keys may repeat.
    OrderedKeyValue(Vec<(String, String)>),
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultSection {
    pub title: String,
    pub body: SectionBody,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub subsections: Vec<ResultSection>,
}

impl ResultSection {
    pub fn ordered_key_value(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: SectionBody::OrderedKeyValue(Vec::new()),
            subsections: Vec::new(),
        }
    }

    pub fn text(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: SectionBody::Text(body.into()),
            subsections: Vec::new(),
        }
    }

    /// No-op on a text section.
    pub fn add_item(&mut self, key: impl Into<String>, value: impl Into<String>) {
        if let SectionBody::OrderedKeyValue(items) = &mut self.body {
            items.push((key.into(), value.into()));
        }
    }

    pub fn add_subsection(&mut self, section: ResultSection) {
        self.subsections.push(section);
    }

    pub fn items(&self) -> &[(String, String)] {
        match &self.body {
            SectionBody::OrderedKeyValue(items) => items.as_slice(),
            SectionBody::Text(_) => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ServiceResult {
    pub sections: Vec<ResultSection>,
}

impl ServiceResult {
    pub fn add_section(&mut self, section: ResultSection) {
        self.sections.push(section);
    }

    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }

    pub fn find(&self, title: &str) -> Option<&ResultSection> {
        self.sections.iter().find(|s| s.title == title)
    }
}
