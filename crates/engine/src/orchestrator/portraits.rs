//! Portrait marker resolution: `{{Name}}` becomes bold text plus an entry in
//! the portrait map. DB/port lookups only, no model call.

use std::collections::HashMap;

use regex_lite::Regex;

use showrunner_domain::CampaignId;

use crate::infrastructure::ports::PortraitPort;

/// Replace every `{{Name}}` marker and resolve portrait URLs for the names
/// that have one.
pub async fn resolve_portraits(
    narrative: &str,
    campaign_id: CampaignId,
    portraits: &dyn PortraitPort,
) -> (String, HashMap<String, String>) {
    let Ok(marker) = Regex::new(r"\{\{([^{}]+)\}\}") else {
        return (narrative.to_string(), HashMap::new());
    };

    let mut names: Vec<String> = Vec::new();
    for capture in marker.captures_iter(narrative) {
        if let Some(name) = capture.get(1) {
            let name = name.as_str().trim().to_string();
            if !name.is_empty() && !names.contains(&name) {
                names.push(name);
            }
        }
    }

    let mut map = HashMap::new();
    for name in &names {
        if let Some(url) = portraits.portrait_url(campaign_id, name).await {
            map.insert(name.clone(), url);
        }
    }

    let mut rewritten = String::with_capacity(narrative.len());
    let mut last = 0;
    for caps in marker.captures_iter(narrative) {
        let (Some(whole), Some(name)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        rewritten.push_str(&narrative[last..whole.start()]);
        rewritten.push_str(&format!("**{}**", name.as_str().trim()));
        last = whole.end();
    }
    rewritten.push_str(&narrative[last..]);

    (rewritten, map)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct OnePortrait;

    #[async_trait]
    impl PortraitPort for OnePortrait {
        async fn portrait_url(&self, _campaign_id: CampaignId, name: &str) -> Option<String> {
            (name == "Mia").then(|| "https://cdn.example/mia.png".to_string())
        }
    }

    #[tokio::test]
    async fn test_markers_become_bold_and_mapped() {
        let narrative = "{{Mia}} lowers her blade. \"You came back,\" {{Mia}} says. {{Kaz}} laughs.";
        let (rewritten, map) =
            resolve_portraits(narrative, CampaignId::new(), &OnePortrait).await;

        assert!(rewritten.contains("**Mia** lowers her blade"));
        assert!(rewritten.contains("**Kaz** laughs"));
        assert!(!rewritten.contains("{{"));
        assert_eq!(map.get("Mia").map(String::as_str), Some("https://cdn.example/mia.png"));
        assert!(!map.contains_key("Kaz"));
    }

    #[tokio::test]
    async fn test_no_markers_is_identity() {
        let narrative = "A quiet morning in the alley.";
        let (rewritten, map) =
            resolve_portraits(narrative, CampaignId::new(), &OnePortrait).await;
        assert_eq!(rewritten, narrative);
        assert!(map.is_empty());
    }
}
