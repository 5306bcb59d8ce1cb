use serde::de::DeserializeOwned;

/// Extract and decode the JSON object from an agent reply.
///
/// Agents are instructed to return bare JSON, but replies frequently
/// arrive wrapped in code fences or preceded by prose. Accept a fenced
/// ```json block first, then fall back to the outermost brace pair.
pub fn parse_agent_json<T: DeserializeOwned>(response: &str) -> Result<T, String> {
    let json_str = extract_json(response)?;
    serde_json::from_str(&json_str).map_err(|e| e.to_string())
}

fn extract_json(response: &str) -> Result<String, String> {
    if let Some(fence_start) = response.find("```json") {
        let content_start = fence_start + 7;
        let fence_end = response[content_start..]
            .find("```")
            .ok_or_else(|| "unclosed ```json fence".to_string())?;
        return Ok(response[content_start..content_start + fence_end]
            .trim()
            .to_string());
    }

    let start = response
        .find('{')
        .ok_or_else(|| "no JSON object found in reply".to_string())?;
    let end = response
        .rfind('}')
        .filter(|&end| end > start)
        .ok_or_else(|| "no closing brace found in reply".to_string())?;
    Ok(response[start..=end].to_string())
}
