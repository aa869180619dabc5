use anyhow::Result;
use std::collections::HashMap;

pub const GENERATE_QUESTIONS: &str = "generate_questions";
pub const RESPOND: &str = "respond";
pub const SKIP: &str = "skip";
pub const HINT: &str = "hint";
pub const EVALUATE: &str = "evaluate";
pub const RESUME_SUMMARY: &str = "resume_summary";

const DEFAULT_GENERATE_QUESTIONS: &str = r#"Role: {role}

You are an expert interview question designer.
Generate exactly THREE interview questions for a mock interview:
1 technical / role-specific question
1 question about previous projects or resume
1 behavioral question.

Return a JSON object:
{
  "questions": [
    { "id": 1, "type": "technical", "text": "..." },
    { "id": 2, "type": "project", "text": "..." },
    { "id": 3, "type": "behavioral", "text": "..." }
  ]
}

Tailor the questions to the role.
Resume summary (if any): {resume_summary}
Topics the candidate wants to practice (if any): {topics}
"#;

const DEFAULT_RESPOND: &str = r#"You are playing the role of an interviewer for the role: {role}.
The current question is: "{question}"

The candidate answered:
{answer}

Reply to the candidate in one or two natural sentences, then assess the answer.

Return JSON:
{
  "reply": "Your short spoken response to the candidate.",
  "summary": "One sentence summary of what the candidate said.",
  "remarks": "One or two sentences on what was good and what was missing.",
  "score": number 0-10
}
"#;

const DEFAULT_SKIP: &str = r#"You are playing the role of an interviewer for the role: {role}.
The candidate chose to skip the question: "{question}"

Acknowledge the skip briefly and kindly, and move on.

Return JSON:
{
  "reply": "A brief acknowledgement.",
  "summary": "Note that the question was skipped.",
  "remarks": "What a good answer would have covered.",
  "score": 0
}
"#;

const DEFAULT_HINT: &str = r#"You are playing the role of an interviewer for the role: {role}.
The candidate is stuck on the question: "{question}"

Give one short hint that nudges them toward a good answer without giving it away.

Return JSON:
{
  "reply": "The hint, spoken to the candidate.",
  "summary": "",
  "remarks": "",
  "score": 0
}
"#;

const DEFAULT_EVALUATE: &str = r#"You are an interview coach evaluating a candidate for the role: {role}.

Here is the full interview transcript:
----------------
{transcript}
----------------

Provide a concise evaluation.
Return JSON ONLY:
{
  "scores": {
    "communication": number 0-10,
    "technical": number 0-10,
    "roleFit": number 0-10,
    "overall": number 0-10
  },
  "feedback": {
    "summary": "2-3 sentence overall summary.",
    "strengths": ["bullet", "points"],
    "improvements": ["bullet", "points"],
    "nextSteps": "short 2-3 sentence guidance."
  }
}
"#;

const DEFAULT_RESUME_SUMMARY: &str = r#"You are helping prepare a mock interview for the role: {role}.

Here is the text extracted from the candidate's resume:
----------------
{resume}
----------------

Summarize the experience, skills and projects most relevant to the role in 3-5 sentences.

Return JSON:
{ "summary": "..." }
"#;

/// The prompt templates used by the interviewer, keyed by name.
#[derive(Debug, Clone)]
pub struct Prompts {
    templates: HashMap<String, String>,
}

impl Default for Prompts {
    fn default() -> Self {
        let templates = [
            (GENERATE_QUESTIONS, DEFAULT_GENERATE_QUESTIONS),
            (RESPOND, DEFAULT_RESPOND),
            (SKIP, DEFAULT_SKIP),
            (HINT, DEFAULT_HINT),
            (EVALUATE, DEFAULT_EVALUATE),
            (RESUME_SUMMARY, DEFAULT_RESUME_SUMMARY),
        ]
        .into_iter()
        .map(|(name, template)| (name.to_string(), template.to_string()))
        .collect();
        Self { templates }
    }
}

impl Prompts {
    /// Replaces built-in templates with the ones in `overrides`. Unknown names are
    /// ignored with a warning.
    pub fn with_overrides(mut self, overrides: HashMap<String, String>) -> Self {
        for (name, template) in overrides {
            if self.templates.contains_key(&name) {
                tracing::info!("Using prompt override for '{}'", name);
                self.templates.insert(name, template);
            } else {
                tracing::warn!("Ignoring unknown prompt template '{}'", name);
            }
        }
        self
    }

    /// Fills the `{name}` placeholders of template `name` in a single pass, so
    /// braces inside substituted values are never expanded.
    pub fn render(&self, name: &str, vars: &[(&str, &str)]) -> Result<String> {
        let template = self
            .templates
            .get(name)
            .ok_or_else(|| anyhow::anyhow!("Unknown prompt template '{name}'"))?;

        let mut out = String::with_capacity(template.len());
        let mut rest = template.as_str();
        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            let after = &rest[open + 1..];
            let value = after.find('}').and_then(|close| {
                let key = &after[..close];
                vars.iter()
                    .find(|(k, _)| *k == key)
                    .map(|(_, v)| (*v, close))
            });
            match value {
                Some((value, close)) => {
                    out.push_str(value);
                    rest = &after[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = after;
                }
            }
        }
        out.push_str(rest);
        Ok(out)
    }
}
