use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Structured-output key carrying the reported signer identity.
pub const ORIGINATOR_KEY: &str = "assessment:originator";

/// Preference panes are opened, not executed; everything else defaults to
/// the execute policy.
static PREF_PANE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:/System)?/Library/PreferencePanes/.+\.prefPane/?$")
        .expect("preference pane regex")
});

/// Which usage context is presented to the assessment authority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssessmentMode {
    Open,
    Execute,
}

impl AssessmentMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AssessmentMode::Open => "open",
            AssessmentMode::Execute => "execute",
        }
    }

    /// Default mode for a path with no stored override.
    pub fn infer(path: &Path) -> Self {
        if PREF_PANE.is_match(&path.to_string_lossy()) {
            AssessmentMode::Open
        } else {
            AssessmentMode::Execute
        }
    }
}

impl fmt::Display for AssessmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One assessment of one path: the authority's exit status, its structured
/// key/value output, and any diagnostic text it produced.
#[derive(Debug, Clone, Default)]
pub struct Assessment {
    pub status: i32,
    pub values: BTreeMap<String, String>,
    pub diagnostics: String,
}

impl Assessment {
    pub fn accepted(&self) -> bool {
        self.status == 0
    }

    pub fn originator(&self) -> Option<&str> {
        self.values.get(ORIGINATOR_KEY).map(String::as_str)
    }
}

/// Seam for the external assessment mechanism, so reconciliation can be
/// exercised against a scripted implementation.
pub trait Assessor {
    fn assess(&self, path: &Path, mode: AssessmentMode) -> Assessment;
}

/// Production assessor: invokes `spctl --assess` and reduces its raw
/// property-list output to flat key/value pairs.
#[derive(Debug, Clone)]
pub struct SpctlAssessor {
    program: PathBuf,
}

impl SpctlAssessor {
    pub fn new() -> Self {
        Self::with_program("spctl")
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for SpctlAssessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Assessor for SpctlAssessor {
    fn assess(&self, path: &Path, mode: AssessmentMode) -> Assessment {
        debug!("Assessing {} ({} mode)", path.display(), mode);
        let output = Command::new(&self.program)
            .arg("--assess")
            .arg("--type")
            .arg(mode.as_str())
            .arg("--raw")
            .arg(path)
            .output();

        match output {
            Ok(out) => {
                let status = out.status.code().unwrap_or(-1);
                let values = if status == 0 {
                    parse_plist_strings(&String::from_utf8_lossy(&out.stdout))
                } else {
                    BTreeMap::new()
                };
                Assessment {
                    status,
                    values,
                    diagnostics: String::from_utf8_lossy(&out.stderr).trim().to_string(),
                }
            }
            // A collaborator that cannot even be launched reports as a
            // failed invocation, not a fatal error.
            Err(err) => Assessment {
                status: -1,
                values: BTreeMap::new(),
                diagnostics: format!("failed to launch {}: {err}", self.program.display()),
            },
        }
    }
}

/// Extract the flat `<key>…</key><string>…</string>` pairs from a raw
/// property list. Nested structures are ignored; the engine only consumes
/// string-valued entries.
fn parse_plist_strings(raw: &str) -> BTreeMap<String, String> {
    static ENTRY: Lazy<Regex> = Lazy::new(|| {
        Regex::new(r"<key>([^<]+)</key>\s*<string>([^<]*)</string>").expect("plist entry regex")
    });
    ENTRY
        .captures_iter(raw)
        .map(|caps| (unescape_xml(&caps[1]), unescape_xml(&caps[2])))
        .collect()
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}
