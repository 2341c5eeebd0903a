//! Input validation utilities

use crate::models::{
    Pagination, PresetFilter, PresetInput, PresetListQuery, PresetPayload, SortField, SortOrder,
};

/// Return the trimmed value of a required field
fn required(value: Option<String>, field: &str) -> Result<String, String> {
    match value.map(|v| v.trim().to_string()) {
        Some(v) if !v.is_empty() => Ok(v),
        _ => Err(format!("Missing required field: {}", field)),
    }
}

/// Trim tags, drop blanks and duplicates, keep first-seen order
pub fn normalize_tags<I>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut normalized: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}

/// Validate a create/update preset body
pub fn validate_preset(payload: PresetPayload) -> Result<PresetInput, String> {
    let name = required(payload.name, "name")?;
    let description = required(payload.description, "description")?;
    let category = required(payload.category, "category")?;
    let command_template = required(payload.command_template, "command_template")?;
    let tool = required(payload.tool, "tool")?;

    Ok(PresetInput {
        name,
        description,
        category,
        command_template,
        input_file_patterns: payload.input_file_patterns.unwrap_or_default(),
        output_file_patterns: payload.output_file_patterns.unwrap_or_default(),
        tags: normalize_tags(payload.tags.unwrap_or_default()),
        tool,
        is_public: payload.is_public.unwrap_or(true),
    })
}

/// Parse the `tags` query parameter.
///
/// Accepts a JSON array of strings; anything else is read as a comma
/// separated list.
pub fn parse_tags(raw: &str) -> Vec<String> {
    match serde_json::from_str::<Vec<String>>(raw) {
        Ok(tags) => normalize_tags(tags),
        Err(_) => normalize_tags(raw.split(',').map(str::to_string)),
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Turn listing query parameters into a filter
pub fn preset_filter(query: PresetListQuery) -> Result<PresetFilter, String> {
    let sort_by = match non_blank(query.sort_by) {
        Some(value) => {
            SortField::parse(&value).ok_or_else(|| format!("Invalid sort field: {}", value))?
        }
        None => SortField::default(),
    };

    let sort_order = match non_blank(query.sort_order) {
        Some(value) => {
            SortOrder::parse(&value).ok_or_else(|| format!("Invalid sort order: {}", value))?
        }
        None => SortOrder::default(),
    };

    Ok(PresetFilter {
        category: non_blank(query.category),
        tool: non_blank(query.tool),
        tags: query.tags.as_deref().map(parse_tags).unwrap_or_default(),
        search: non_blank(query.search),
        sort_by,
        sort_order,
        pagination: Pagination::new(query.page, query.limit),
    })
}

/// Escape `%`, `_` and `\` so user input matches literally inside `ILIKE`
pub fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> PresetPayload {
        PresetPayload {
            name: Some("  Grayscale  ".to_string()),
            description: Some("Convert to grayscale ".to_string()),
            category: Some("image".to_string()),
            command_template: Some(" convert {input_file} -colorspace Gray {output_file}".to_string()),
            tool: Some("imagemagick".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_validate_preset_trims_and_defaults() {
        let input = validate_preset(payload()).unwrap();
        assert_eq!(input.name, "Grayscale");
        assert_eq!(input.description, "Convert to grayscale");
        assert_eq!(
            input.command_template,
            "convert {input_file} -colorspace Gray {output_file}"
        );
        assert!(input.is_public);
        assert!(input.tags.is_empty());
        assert!(input.input_file_patterns.is_empty());
    }

    #[test]
    fn test_validate_preset_reports_first_missing_field() {
        let mut body = payload();
        body.category = Some("   ".to_string());
        body.tool = None;
        assert_eq!(
            validate_preset(body),
            Err("Missing required field: category".to_string())
        );
    }

    #[test]
    fn test_validate_preset_keeps_private_flag() {
        let mut body = payload();
        body.is_public = Some(false);
        body.tags = Some(vec![" png ".into(), "".into(), "png".into(), "resize".into()]);

        let input = validate_preset(body).unwrap();
        assert!(!input.is_public);
        assert_eq!(input.tags, vec!["png", "resize"]);
    }

    #[test]
    fn test_parse_tags_json_and_comma_forms() {
        assert_eq!(parse_tags(r#"["pdf","merge"]"#), vec!["pdf", "merge"]);
        assert_eq!(parse_tags("pdf, merge,,pdf"), vec!["pdf", "merge"]);
        assert!(parse_tags("").is_empty());
    }

    #[test]
    fn test_preset_filter_defaults() {
        let filter = preset_filter(PresetListQuery::default()).unwrap();
        assert_eq!(filter, PresetFilter::default());
    }

    #[test]
    fn test_preset_filter_rejects_unknown_sort() {
        let query = PresetListQuery {
            sort_by: Some("user_id; DROP TABLE presets".to_string()),
            ..Default::default()
        };
        assert!(preset_filter(query).is_err());

        let query = PresetListQuery {
            sort_order: Some("up".to_string()),
            ..Default::default()
        };
        assert!(preset_filter(query).is_err());
    }

    #[test]
    fn test_preset_filter_normalizes_values() {
        let query = PresetListQuery {
            page: Some(2),
            limit: Some(10),
            category: Some(" image ".to_string()),
            tool: Some("".to_string()),
            tags: Some(r#"["resize"]"#.to_string()),
            search: Some("  thumb ".to_string()),
            sort_by: Some("likes_count".to_string()),
            sort_order: Some("asc".to_string()),
        };

        let filter = preset_filter(query).unwrap();
        assert_eq!(filter.category.as_deref(), Some("image"));
        assert_eq!(filter.tool, None);
        assert_eq!(filter.tags, vec!["resize"]);
        assert_eq!(filter.search.as_deref(), Some("thumb"));
        assert_eq!(filter.sort_by, SortField::LikesCount);
        assert_eq!(filter.sort_order, SortOrder::Asc);
        assert_eq!(filter.pagination.offset(), 10);
    }

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("plain"), "plain");
    }
}
