use crate::db;
use serde_json::{json, Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsSection {
    General,
    Seo,
    Payments,
}

impl SettingsSection {
    pub const ALL: [SettingsSection; 3] = [Self::General, Self::Seo, Self::Payments];

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "general" => Some(Self::General),
            "seo" => Some(Self::Seo),
            "payments" => Some(Self::Payments),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::Seo => "seo",
            Self::Payments => "payments",
        }
    }

    fn key(self) -> &'static str {
        match self {
            Self::General => "settings.general",
            Self::Seo => "settings.seo",
            Self::Payments => "settings.payments",
        }
    }
}

pub fn default_section(section: SettingsSection) -> Value {
    match section {
        SettingsSection::General => json!({
            "siteName": "LMS",
            "supportEmail": "",
            "itemsPerPage": 20
        }),
        SettingsSection::Seo => json!({
            "metaTitle": "",
            "metaDescription": "",
            "metaKeywords": "",
            "ogImage": null
        }),
        SettingsSection::Payments => json!({
            "commissionRatePercent": 10,
            "payoutHoldDays": 0
        }),
    }
}

fn parse_i64_range(v: &Value, key: &str, min: i64, max: i64) -> Result<i64, String> {
    let n = v
        .as_i64()
        .ok_or_else(|| format!("{} must be integer", key))?;
    if !(min..=max).contains(&n) {
        return Err(format!("{} must be in {}..={}", key, min, max));
    }
    Ok(n)
}

fn parse_string_max(v: &Value, key: &str, max_len: usize) -> Result<String, String> {
    let s = v.as_str().ok_or_else(|| format!("{} must be string", key))?;
    let s = s.trim();
    if s.len() > max_len {
        return Err(format!("{} length must be <= {}", key, max_len));
    }
    Ok(s.to_string())
}

fn parse_nullable_string_max(v: &Value, key: &str, max_len: usize) -> Result<Value, String> {
    if v.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::String(parse_string_max(v, key, max_len)?))
}

/// Validate `patch` field by field and write accepted values into `current`.
/// The first invalid field aborts the merge with a message naming it.
pub fn merge_section_patch(
    section: SettingsSection,
    current: &mut Value,
    patch: &Map<String, Value>,
) -> Result<(), String> {
    let obj = current
        .as_object_mut()
        .ok_or_else(|| "internal settings object must be a JSON object".to_string())?;
    for (k, v) in patch {
        match section {
            SettingsSection::General => match k.as_str() {
                "siteName" => {
                    let s = parse_string_max(v, k, 120)?;
                    if s.is_empty() {
                        return Err("siteName must not be empty".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "supportEmail" => {
                    let s = parse_string_max(v, k, 200)?;
                    if !s.is_empty() && !s.contains('@') {
                        return Err("supportEmail must be an email address".into());
                    }
                    obj.insert(k.clone(), Value::String(s));
                }
                "itemsPerPage" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 1, 200)?));
                }
                _ => return Err(format!("unknown general field: {}", k)),
            },
            SettingsSection::Seo => match k.as_str() {
                "metaTitle" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 120)?));
                }
                "metaDescription" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 320)?));
                }
                "metaKeywords" => {
                    obj.insert(k.clone(), Value::String(parse_string_max(v, k, 255)?));
                }
                "ogImage" => {
                    obj.insert(k.clone(), parse_nullable_string_max(v, k, 500)?);
                }
                _ => return Err(format!("unknown seo field: {}", k)),
            },
            SettingsSection::Payments => match k.as_str() {
                "commissionRatePercent" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 100)?));
                }
                "payoutHoldDays" => {
                    obj.insert(k.clone(), Value::from(parse_i64_range(v, k, 0, 365)?));
                }
                _ => return Err(format!("unknown payments field: {}", k)),
            },
        }
    }
    Ok(())
}

pub fn load_section(conn: &rusqlite::Connection, section: SettingsSection) -> anyhow::Result<Value> {
    let mut current = default_section(section);
    if let Some(saved) = db::settings_get_json(conn, section.key())? {
        if let Some(saved_obj) = saved.as_object() {
            // Malformed stored values fall back to defaults field by field.
            for (k, v) in saved_obj {
                let mut single = Map::new();
                single.insert(k.clone(), v.clone());
                let _ = merge_section_patch(section, &mut current, &single);
            }
        }
    }
    Ok(current)
}

pub fn save_section(
    conn: &rusqlite::Connection,
    section: SettingsSection,
    value: &Value,
) -> anyhow::Result<()> {
    db::settings_set_json(conn, section.key(), value)
}

/// Read one integer field, falling back to the section default.
pub fn section_i64(conn: &rusqlite::Connection, section: SettingsSection, field: &str) -> anyhow::Result<i64> {
    let value = load_section(conn, section)?;
    value
        .get(field)
        .and_then(|v| v.as_i64())
        .or_else(|| default_section(section).get(field).and_then(|v| v.as_i64()))
        .ok_or_else(|| anyhow::anyhow!("unknown {} field: {}", section.name(), field))
}
