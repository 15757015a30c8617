//! Language configuration for compilation and execution

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use serde::Deserialize;

use crate::core::Language;

/// Configuration for a supported programming language
#[derive(Debug, Clone)]
pub struct LanguageConfig {
    /// Name of the source file (e.g., "main.cpp")
    pub source_file: String,
    /// Container image the commands run in
    pub image: String,
    /// Compile command (None for interpreted languages)
    pub compile_command: Option<Vec<String>>,
    /// Run command
    pub run_command: Vec<String>,
}

impl LanguageConfig {
    /// Command for the run step
    ///
    /// Compiled languages rebuild from source in the same container before
    /// executing, so the run step never depends on the compile step's workspace.
    pub fn run_invocation(&self) -> Vec<String> {
        match &self.compile_command {
            Some(compile) => vec![
                "sh".to_string(),
                "-c".to_string(),
                format!(
                    "{} >/dev/null 2>&1 && exec {}",
                    compile.join(" "),
                    self.run_command.join(" ")
                ),
            ],
            None => self.run_command.clone(),
        }
    }
}

/// Raw TOML configuration for a language
#[derive(Debug, Deserialize)]
struct RawLanguageConfig {
    source_file: String,
    image: String,
    compile_command: Option<String>,
    run_command: String,
}

/// Per-language command table
#[derive(Debug, Clone)]
pub struct LanguageTable {
    languages: HashMap<Language, LanguageConfig>,
}

impl LanguageTable {
    /// Table embedded at build time from `files/languages.toml`
    pub fn builtin() -> anyhow::Result<Self> {
        let content = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/files/languages.toml"));
        Self::parse(content)
    }

    /// Load an override table from disk
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read language config {:?}", path))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let raw_configs: HashMap<String, RawLanguageConfig> = toml::from_str(content)?;

        let mut languages = HashMap::new();
        for (name, raw) in raw_configs {
            let language: Language = name
                .parse()
                .map_err(|_| anyhow::anyhow!("Unknown language in config: {}", name))?;

            let run_command = into_command(&raw.run_command);
            if run_command.is_empty() {
                anyhow::bail!("Empty run command for {}", name);
            }

            let config = LanguageConfig {
                source_file: raw.source_file,
                image: raw.image,
                compile_command: raw
                    .compile_command
                    .map(|cmd| into_command(&cmd))
                    .filter(|cmd| !cmd.is_empty()),
                run_command,
            };
            languages.insert(language, config);
        }

        Ok(Self { languages })
    }

    /// Get language configuration
    pub fn get(&self, language: Language) -> Option<&LanguageConfig> {
        self.languages.get(&language)
    }

    /// Canonical names of all configured languages
    pub fn supported_languages(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.languages.keys().map(|l| l.as_str()).collect();
        names.sort_unstable();
        names
    }
}

fn into_command(command: &str) -> Vec<String> {
    command.split_whitespace().map(|s| s.to_string()).collect()
}
