use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::Path;

/// Reads every `.md` file in `dir_path` as a prompt template keyed by its file stem.
/// Blank files are skipped so a stray empty override cannot wipe out a built-in prompt.
pub fn load_prompts(dir_path: &Path) -> Result<HashMap<String, String>> {
    let mut prompts = HashMap::new();

    for entry in fs::read_dir(dir_path)
        .with_context(|| format!("Failed to read prompts directory: {}", dir_path.display()))?
    {
        let path = entry?.path();
        if !path.is_file() || path.extension().and_then(|s| s.to_str()) != Some("md") {
            continue;
        }

        let prompt_key = path
            .file_stem()
            .and_then(|s| s.to_str())
            .context("Could not get file stem for prompt file")?
            .to_string();
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read prompt file: {}", path.display()))?;

        if content.trim().is_empty() {
            tracing::warn!("Ignoring empty prompt file {}", path.display());
            continue;
        }
        prompts.insert(prompt_key, content);
    }

    Ok(prompts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn test_load_prompts_by_file_stem() -> Result<()> {
        let dir = tempdir()?;
        let dir_path = dir.path();

        // `{{...}}` in `writeln!` writes single braces to the file.
        let mut respond = File::create(dir_path.join("respond.md"))?;
        writeln!(respond, "Interviewer for {{role}}. Question: {{question}}")?;

        let mut skip = File::create(dir_path.join("skip.md"))?;
        writeln!(skip, "The candidate skipped.")?;

        let mut ignored = File::create(dir_path.join("notes.txt"))?;
        writeln!(ignored, "not a prompt")?;

        File::create(dir_path.join("evaluate.md"))?;
        std::fs::create_dir(dir_path.join("drafts"))?;

        let prompts = load_prompts(dir_path)?;

        assert_eq!(prompts.len(), 2, "only non-empty .md files are loaded");
        assert_eq!(
            prompts.get("respond").unwrap(),
            "Interviewer for {role}. Question: {question}\n"
        );
        assert_eq!(prompts.get("skip").unwrap(), "The candidate skipped.\n");
        assert!(prompts.get("notes").is_none());
        assert!(prompts.get("evaluate").is_none());

        Ok(())
    }

    #[test]
    fn test_load_prompts_from_nonexistent_dir() {
        let result = load_prompts(Path::new("nonexistent_dir_for_testing_prompts"));
        assert!(result.is_err());
    }
}
