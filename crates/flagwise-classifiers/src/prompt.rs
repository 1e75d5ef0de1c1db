//! Instruction prompt shared by every provider

use crate::remote::ClassifyRequest;

/// System instructions for chat-style providers
pub const SYSTEM_PROMPT: &str = "You are a relationship counselor AI. Analyze relationship \
journal entries for red flags (concerning, unhealthy behaviors) or green flags (healthy \
behaviors). Respond with valid JSON only. Physical violence, threats and controlling \
behavior are always red flags.";

const DECISION_RULES: &str = r#"CLASSIFICATION:
- GREEN FLAG: loving, supportive, healthy behavior ("I love you", hugs, listening, helping, apologizing)
- RED FLAG: harmful, controlling or dangerous behavior (hitting, slapping, pushing, choking, throwing things, threats, name-calling, "won't let me", isolation)
- NEUTRAL: normal everyday interactions (dinner together, watching TV, chatting)

EXAMPLES:
- "He told me he loved me" = green
- "She listened to my problems" = green
- "He hit me when angry" = red
- "She called me stupid" = red
- "Won't let me see friends" = red
- "We had dinner together" = neutral

Respond with a JSON object in exactly this format:
{
  "flag": "green" | "red" | "neutral",
  "title": "Brief title describing the analysis",
  "message": "Explanation of why this is flagged this way",
  "suggestions": ["2-3 helpful suggestions"],
  "confidence": 0.8
}

SAFETY RULES:
- ANY mention of physical violence, threats or abuse is a RED FLAG
- Do not mark healthy expressions of love as red flags"#;

/// Build the user-facing prompt for `request`
pub fn user_prompt(request: &ClassifyRequest) -> String {
    format!(
        "Task: {}\n\n{}\n\nANALYZE THIS JOURNAL ENTRY: \"{}\"",
        request.task,
        DECISION_RULES,
        request.text.replace('"', "\\\"")
    )
}

/// Build a single prompt for providers without a system role
pub fn combined_prompt(request: &ClassifyRequest) -> String {
    format!("{}\n\n{}", SYSTEM_PROMPT, user_prompt(request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_embeds_text_and_task() {
        let request = ClassifyRequest::new("He said \"sorry\" and hugged me");
        let prompt = user_prompt(&request);
        assert!(prompt.starts_with("Task: classify-relationship-entry"));
        assert!(prompt.contains(r#"He said \"sorry\" and hugged me"#));

        let combined = combined_prompt(&request);
        assert!(combined.starts_with(SYSTEM_PROMPT));
        assert!(combined.ends_with(&prompt));
    }
}
