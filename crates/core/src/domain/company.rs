use anyhow::Context;
use serde::{Deserialize, Serialize};

const DEFAULT_INDUSTRY: &str = "一般產業";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Company {
    /// Exchange code, e.g. "2412".
    pub id: String,
    pub name: String,
    #[serde(rename = "nameEn")]
    pub name_en: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub industry: Option<String>,
}

impl Company {
    /// Industry label used in prompts; unclassified companies fall back to a generic label.
    pub fn industry_or_default(&self) -> &str {
        self.industry
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or(DEFAULT_INDUSTRY)
    }

    fn matches(&self, needle: &str) -> bool {
        self.id.to_lowercase().contains(needle)
            || self.name.to_lowercase().contains(needle)
            || self.name_en.to_lowercase().contains(needle)
    }
}

/// Reference data loaded once at startup and never mutated.
#[derive(Debug, Clone, Default)]
pub struct CompanyDirectory {
    companies: Vec<Company>,
}

impl CompanyDirectory {
    pub fn new(companies: Vec<Company>) -> Self {
        Self { companies }
    }

    pub fn from_json_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        let companies = serde_json::from_slice::<Vec<Company>>(bytes)
            .context("company directory is not a JSON array of {id, name, nameEn, industry?}")?;
        Ok(Self::new(companies))
    }

    pub fn len(&self) -> usize {
        self.companies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.companies.is_empty()
    }

    pub fn all(&self) -> &[Company] {
        &self.companies
    }

    pub fn first(&self) -> Option<&Company> {
        self.companies.first()
    }

    pub fn get(&self, id: &str) -> Option<&Company> {
        let id = id.trim();
        self.companies.iter().find(|c| c.id == id)
    }

    /// Case-insensitive substring match over id, name and English name.
    /// A blank query matches nothing.
    pub fn search(&self, query: &str) -> Vec<&Company> {
        let needle = query.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.companies.iter().filter(|c| c.matches(&needle)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn directory() -> CompanyDirectory {
        CompanyDirectory::from_json_slice(
            r#"[
                {"id": "2412", "name": "中華電信", "nameEn": "Chunghwa Telecom", "industry": "電信業"},
                {"id": "2330", "name": "台積電", "nameEn": "TSMC"}
            ]"#
            .as_bytes(),
        )
        .unwrap()
    }

    #[test]
    fn parses_directory_with_optional_industry() {
        let dir = directory();
        assert_eq!(dir.len(), 2);
        assert_eq!(dir.get("2412").unwrap().industry_or_default(), "電信業");
        assert_eq!(dir.get("2330").unwrap().industry_or_default(), "一般產業");
        assert_eq!(dir.first().unwrap().id, "2412");
    }

    #[test]
    fn search_matches_id_name_and_english_name() {
        let dir = directory();
        assert_eq!(dir.search("tsmc")[0].id, "2330");
        assert_eq!(dir.search("電信")[0].id, "2412");
        assert_eq!(dir.search("24").len(), 1);
        assert!(dir.search("   ").is_empty());
    }

    #[test]
    fn rejects_malformed_directory() {
        assert!(CompanyDirectory::from_json_slice(b"{\"id\": 1}").is_err());
    }
}
