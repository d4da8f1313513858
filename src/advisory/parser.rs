use serde::Deserialize;
use serde_json::Value;

use super::AdvisoryError;

/// Parse the model's answer into allergy names.
///
/// Accepts a fenced ```json block or a bare JSON object. Entries that are
/// not strings are skipped. Allergies the model reports as confirmed are
/// returned too; the caller only ever treats them as possible.
pub fn parse_advisory_response(response: &str) -> Result<Vec<String>, AdvisoryError> {
    #[derive(Deserialize)]
    struct RawResponse {
        possible_allergens: Option<Vec<Value>>,
        confirmed_allergens: Option<Vec<Value>>,
    }

    let json_str = extract_json(response)?;
    let raw: RawResponse =
        serde_json::from_str(json_str).map_err(|e| AdvisoryError::JsonParsing(e.to_string()))?;

    if raw.possible_allergens.is_none() && raw.confirmed_allergens.is_none() {
        return Err(AdvisoryError::MalformedResponse(
            "No allergen list in response".into(),
        ));
    }

    let names = raw
        .possible_allergens
        .into_iter()
        .chain(raw.confirmed_allergens)
        .flatten()
        .filter_map(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s),
            _ => None,
        })
        .collect();
    Ok(names)
}

fn extract_json(response: &str) -> Result<&str, AdvisoryError> {
    if let Some(start) = response.find("```json") {
        let content_start = start + 7;
        let end = response[content_start..]
            .find("```")
            .ok_or_else(|| AdvisoryError::MalformedResponse("Unclosed JSON block".into()))?;
        return Ok(response[content_start..content_start + end].trim());
    }

    let start = response
        .find('{')
        .ok_or_else(|| AdvisoryError::MalformedResponse("No JSON object found".into()))?;
    let end = response
        .rfind('}')
        .filter(|end| *end > start)
        .ok_or_else(|| AdvisoryError::MalformedResponse("Unclosed JSON object".into()))?;
    Ok(&response[start..=end])
}
