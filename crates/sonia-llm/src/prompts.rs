//! Fixed prompt templates and JSON response schemas.

use serde_json::{json, Value};
use sonia_core::{Language, UserContext};

/// Response schema for per-turn and per-entry emotion analysis.
pub fn emotion_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "label": {
                "type": "STRING",
                "description": "The dominant emotion detected: Happy, Sad, Stress, Anxiety, Anger, Burnout, Neutral, Excited"
            },
            "confidence": {
                "type": "NUMBER",
                "description": "Confidence score from 0 to 1"
            },
            "intensity": {
                "type": "NUMBER",
                "description": "Intensity percentage from 0 to 100"
            },
            "response": {
                "type": "STRING",
                "description": "The empathetic AI response in the requested language."
            },
            "activities": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "List of 2-3 recommended activities to improve or maintain current mood."
            }
        },
        "required": ["label", "confidence", "intensity", "response", "activities"]
    })
}

/// Response schema for the wellness report.
pub fn report_schema() -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            "summary": {
                "type": "STRING",
                "description": "A 3-sentence summary of the user emotional trajectory."
            },
            "stabilityScore": {
                "type": "NUMBER",
                "description": "Neural stability index from 0 to 100."
            },
            "keyThemes": {
                "type": "ARRAY",
                "items": { "type": "STRING" },
                "description": "Top 3 recurring emotional themes."
            },
            "recommendation": {
                "type": "STRING",
                "description": "A personalized therapeutic action plan."
            }
        },
        "required": ["summary", "stabilityScore", "keyThemes", "recommendation"]
    })
}

/// System instruction for chat turns: the six-step Sonia protocol.
pub fn system_prompt(context: &UserContext) -> String {
    let role = context.role.as_str();
    let language = context.language.as_str();
    format!(
        r#"
You are Sonia, a professional emotional wellness assistant and empathetic virtual psychologist.

User Context:
- Life Context: {role}
- Preferred Language: {language}

Your task is to respond to the user following this strict 6-step protocol:
1. Acknowledge: Identify the user’s detected emotion in the first line.
2. Reflect: Mirror their feeling back in simple, warm words.
3. Normalize: Reassure them that their experience is valid, especially as a {role}.
4. Support: Offer exactly ONE supportive thought or gentle grounding technique.
5. Inquire: Optionally ask ONE open-ended, non-invasive question.
6. Language: Always respond strictly in {language}.

Persona Rules:
- Act as a calm, empathetic human therapist.
- Never judge, shame, or diagnose. Avoid clinical/medical labels.
- Do not provide crisis, legal, or medical advice.
- Keep the 'response' field between 3–5 lines max.

Output Format:
Return a JSON object matching the provided schema. Detect the emotion (label) and intensity based on the input.
"#
    )
}

pub const JOURNAL_ANALYST_INSTRUCTION: &str =
    "You are an AI emotion analyst. Output high-fidelity emotion data in JSON format.";

pub const REPORT_INSTRUCTION: &str = "You are a world-class AI psychotherapist specialized in data synthesis. Provide a professional wellness report in JSON.";

pub const TRANSCRIBE_PROMPT: &str =
    "Transcribe this audio message accurately. Return only the transcription.";

pub fn journal_prompt(text: &str, context: &UserContext) -> String {
    format!(
        "Analyze this journal entry for emotional state. Provide insights appropriate for a {} in {}. \n\nEntry: {}",
        context.role, context.language, text
    )
}

pub fn report_prompt(trajectory: &str, context: &UserContext) -> String {
    format!(
        "Generate a comprehensive emotional wellness report based on the following trajectory data:\n\n{}\n\nTarget Context: {}",
        trajectory, context.role
    )
}

pub fn speech_prompt(text: &str, language: Language) -> String {
    format!("Say in a calm, warm voice, speaking {}: {}", language, text)
}

/// System instruction for the realtime voice session.
pub fn live_instruction(context: &UserContext) -> String {
    let role = context.role.as_str();
    format!(
        "You are Sonia, a professional emotional wellness assistant. \n\
Language: Speak in {language}. \n\
User Context: {role}.\n\
\n\
Persona: Calm, empathetic, warm, and highly supportive therapist.\n\
Interaction Protocol:\n\
1. Acknowledge emotion immediately.\n\
2. Reflect with warmth.\n\
3. Normalize based on context: {role}.\n\
4. Offer one grounding thought.\n\
5. Ask at most one gentle question.\n\
6. Keep it very concise (3-5 lines).",
        language = context.language.as_str(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonia_core::LifeContext;

    #[test]
    fn test_system_prompt_carries_context() {
        let ctx = UserContext { role: LifeContext::Student, language: Language::Hindi };
        let prompt = system_prompt(&ctx);
        assert!(prompt.contains("- Life Context: Student"));
        assert!(prompt.contains("especially as a Student."));
        assert!(prompt.contains("Always respond strictly in Hindi."));
    }

    #[test]
    fn test_schemas_require_all_fields() {
        let emotion = emotion_schema();
        assert_eq!(emotion["required"].as_array().unwrap().len(), 5);
        assert_eq!(emotion["properties"]["activities"]["items"]["type"], "STRING");

        let report = report_schema();
        assert!(report["properties"].get("stabilityScore").is_some());
    }

    #[test]
    fn test_live_instruction() {
        let prompt = live_instruction(&UserContext::default());
        assert!(prompt.contains("Speak in English."));
        assert!(prompt.contains("Normalize based on context: Office worker."));
    }

    #[test]
    fn test_speech_prompt_names_language() {
        let prompt = speech_prompt("Breathe in slowly.", Language::Hindi);
        assert!(prompt.contains("speaking Hindi"));
        assert!(prompt.ends_with("Breathe in slowly."));
    }
}
