use crate::error::{CtxError, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Agents
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Agent {
    Cursor,
    OpenCode,
    Copilot,
    Claude,
    Gemini,
    Augment,
    Windsurf,
    Codex,
}

impl Agent {
    pub const ALL: [Agent; 8] = [
        Agent::Cursor,
        Agent::OpenCode,
        Agent::Copilot,
        Agent::Claude,
        Agent::Gemini,
        Agent::Augment,
        Agent::Windsurf,
        Agent::Codex,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Agent::Cursor => "cursor",
            Agent::OpenCode => "opencode",
            Agent::Copilot => "copilot",
            Agent::Claude => "claude",
            Agent::Gemini => "gemini",
            Agent::Augment => "augment",
            Agent::Windsurf => "windsurf",
            Agent::Codex => "codex",
        }
    }
}

impl fmt::Display for Agent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Agent {
    type Err = CtxError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().to_ascii_lowercase();
        Agent::ALL
            .into_iter()
            .find(|agent| agent.as_str() == wanted)
            .ok_or_else(|| CtxError::UnknownAgent {
                name: s.to_string(),
                expected: Agent::ALL.map(Agent::as_str).join(", "),
            })
    }
}

// ---------------------------------------------------------------------------
// Path table
// ---------------------------------------------------------------------------

/// Where one agent keeps its files, relative to a search root.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentPaths {
    pub rules: Vec<PathBuf>,
    pub commands: Vec<PathBuf>,
    pub tasks: Vec<PathBuf>,
    pub skills: Vec<PathBuf>,
    /// Path fragments identifying files this agent already reads natively.
    pub markers: Vec<String>,
}

impl AgentPaths {
    fn new(rules: &[&str], commands: &[&str], markers: &[&str]) -> Self {
        Self {
            rules: rules.iter().map(PathBuf::from).collect(),
            commands: commands.iter().map(PathBuf::from).collect(),
            markers: markers.iter().map(|m| m.to_string()).collect(),
            ..Self::default()
        }
    }
}

/// Per-agent search configuration handed to the assembler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentTable {
    pub generic: AgentPaths,
    pub agents: BTreeMap<Agent, AgentPaths>,
    /// Rule locations searched under the user's home directory.
    pub user_rules: Vec<PathBuf>,
}

impl Default for AgentTable {
    fn default() -> Self {
        let generic = AgentPaths {
            rules: vec![".agents/rules".into()],
            commands: vec![".agents/commands".into()],
            tasks: vec![".agents/tasks".into()],
            skills: vec![".agents/skills".into()],
            markers: Vec::new(),
        };

        let agents = BTreeMap::from([
            (
                Agent::Cursor,
                AgentPaths::new(
                    &[".cursor/rules", ".cursorrules"],
                    &[".cursor/commands"],
                    &[".cursor/", ".cursorrules"],
                ),
            ),
            (
                Agent::OpenCode,
                AgentPaths::new(
                    &[".opencode/agent", ".opencode/rules"],
                    &[".opencode/command"],
                    &[".opencode/"],
                ),
            ),
            (
                Agent::Copilot,
                AgentPaths::new(
                    &[".github/copilot-instructions.md", ".github/agents"],
                    &[],
                    &[".github/copilot-instructions.md", ".github/agents/"],
                ),
            ),
            (
                Agent::Claude,
                AgentPaths {
                    skills: vec![".claude/skills".into()],
                    ..AgentPaths::new(
                        &["CLAUDE.md", "CLAUDE.local.md", ".claude/rules"],
                        &[".claude/commands"],
                        &[".claude/", "CLAUDE.md", "CLAUDE.local.md"],
                    )
                },
            ),
            (
                Agent::Gemini,
                AgentPaths::new(
                    &[".gemini/styleguide.md", "GEMINI.md"],
                    &[],
                    &[".gemini/", "GEMINI.md"],
                ),
            ),
            (
                Agent::Augment,
                AgentPaths::new(
                    &[".augment/rules", ".augment/guidelines.md"],
                    &[],
                    &[".augment/"],
                ),
            ),
            (
                Agent::Windsurf,
                AgentPaths::new(
                    &[".windsurf/rules", ".windsurfrules"],
                    &[],
                    &[".windsurf/", ".windsurfrules"],
                ),
            ),
            (
                Agent::Codex,
                AgentPaths::new(&["AGENTS.md"], &[], &[".codex/", "AGENTS.md"]),
            ),
        ]);

        let user_rules = [
            ".agents/rules",
            ".claude/CLAUDE.md",
            ".codex/AGENTS.md",
            ".gemini/GEMINI.md",
            ".opencode/rules",
        ]
        .into_iter()
        .map(PathBuf::from)
        .collect();

        Self {
            generic,
            agents,
            user_rules,
        }
    }
}

/// Which slice of [`AgentPaths`] a lookup walks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kind {
    Rules,
    Commands,
    Tasks,
    Skills,
}

impl AgentTable {
    /// Every location of `kind` across the generic entry and all agents, in
    /// table order, without duplicates.
    pub fn locations(&self, kind: Kind) -> Vec<&Path> {
        let mut out: Vec<&Path> = Vec::new();
        for paths in std::iter::once(&self.generic).chain(self.agents.values()) {
            let list = match kind {
                Kind::Rules => &paths.rules,
                Kind::Commands => &paths.commands,
                Kind::Tasks => &paths.tasks,
                Kind::Skills => &paths.skills,
            };
            for path in list {
                if !out.contains(&path.as_path()) {
                    out.push(path);
                }
            }
        }
        out
    }

    /// True when `relative` (a path below a search root) belongs to `agent`'s
    /// own conventions.
    pub fn is_native(&self, agent: Agent, relative: &Path) -> bool {
        let Some(paths) = self.agents.get(&agent) else {
            return false;
        };
        let normalized = relative.to_string_lossy().replace('\\', "/");
        paths
            .markers
            .iter()
            .any(|marker| normalized.contains(marker.as_str()))
    }
}
