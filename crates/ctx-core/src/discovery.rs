//! Finds the task, its slash commands, rules and skills, and assembles the
//! final prompt.

use crate::agent::{Agent, AgentTable, Kind};
use crate::document::{estimate_tokens, ContextResult, Document};
use crate::error::{CtxError, Result};
use crate::expand::Expander;
use crate::params::Params;
use crate::process::{Bootstrap, ProcessRunner};
use crate::remote::{self, Fetcher, SearchRoots};
use crate::selectors::Selectors;
use crate::skills::{render_skills, Skill, SKILL_FILE};
use crate::task::{parse_task, Block, SlashCommand};
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const MARKDOWN_EXTENSIONS: [&str; 2] = ["md", "mdc"];
const DESCRIPTION_PREVIEW: usize = 100;

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Configuration for one assembly run.
#[derive(Debug, Clone)]
pub struct Options {
    /// Project directory: first search root, base for `@path` references and
    /// working directory for commands and bootstraps.
    pub work_dir: PathBuf,
    /// Searched last, for user-wide rules and tasks.
    pub home_dir: Option<PathBuf>,
    /// Extra roots: local paths, `file://` URLs or remote sources.
    pub search_paths: Vec<String>,
    /// A file listing more search paths, one per line.
    pub manifest_url: Option<String>,
    pub params: Params,
    pub selectors: Selectors,
    pub agent: Option<Agent>,
    /// Continue an earlier session: rules, skills and bootstraps are skipped.
    pub resume: bool,
    /// Free text appended to the task after a `---` line.
    pub user_prompt: Option<String>,
    pub agents: AgentTable,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            work_dir: PathBuf::from("."),
            home_dir: None,
            search_paths: Vec::new(),
            manifest_url: None,
            params: Params::new(),
            selectors: Selectors::new(),
            agent: None,
            resume: false,
            user_prompt: None,
            agents: AgentTable::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaskSummary {
    pub name: String,
    pub path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

// ---------------------------------------------------------------------------
// Assembler
// ---------------------------------------------------------------------------

pub struct Assembler<'a> {
    options: Options,
    runner: &'a dyn ProcessRunner,
    fetcher: &'a dyn Fetcher,
}

impl<'a> Assembler<'a> {
    pub fn new(options: Options, runner: &'a dyn ProcessRunner, fetcher: &'a dyn Fetcher) -> Self {
        Self {
            options,
            runner,
            fetcher,
        }
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    /// Assemble the context for `task_name`.
    ///
    /// Fetched search paths are removed before this returns, on success and
    /// on error alike.
    pub fn run(&self, task_name: &str) -> Result<ContextResult> {
        let _span = tracing::info_span!("run", task = task_name).entered();

        let roots = self.search_roots()?;
        let mut run = Run::new(self, &roots.roots);

        let task = run.task(task_name)?;
        let (rules, skills) = if run.resuming() {
            tracing::info!("resume mode: skipping rules and skills");
            (Vec::new(), Vec::new())
        } else {
            (run.rules()?, run.skills()?)
        };

        let skills_block = render_skills(&skills);
        let tokens = rules.iter().map(|r| r.tokens).sum::<usize>()
            + estimate_tokens(&skills_block)
            + task.tokens;
        let prompt = assemble_prompt(&rules, &skills_block, &task);
        tracing::info!(
            rules = rules.len(),
            skills = skills.len(),
            tokens,
            "assembled context"
        );

        Ok(ContextResult {
            agent: run.agent,
            rules,
            skills,
            task,
            tokens,
            prompt,
        })
    }

    /// Every task file visible from the configured search roots.
    pub fn list_tasks(&self) -> Result<Vec<TaskSummary>> {
        let roots = self.search_roots()?;
        let run = Run::new(self, &roots.roots);

        let mut tasks = Vec::new();
        for candidate in run.candidates(Kind::Tasks)? {
            let doc = Document::load(&candidate.path)?;
            tasks.push(TaskSummary {
                name: doc.stem().to_string(),
                description: describe(&doc),
                path: doc.path,
            });
        }
        Ok(tasks)
    }

    fn search_roots(&self) -> Result<SearchRoots> {
        let mut sources = self.options.search_paths.clone();
        if let Some(manifest) = &self.options.manifest_url {
            let text = if remote::is_local(manifest) {
                let path = remote::local_path(manifest, &self.options.work_dir);
                std::fs::read_to_string(&path).map_err(|source| CtxError::Read { path, source })?
            } else {
                self.fetcher.fetch_text(manifest)?
            };
            let listed = remote::parse_manifest(&text);
            tracing::info!(manifest = %manifest, paths = listed.len(), "read manifest");
            sources.extend(listed);
        }
        SearchRoots::resolve(&sources, &self.options.work_dir, self.fetcher)
    }
}

fn assemble_prompt(rules: &[Document], skills_block: &str, task: &Document) -> String {
    let mut prompt = String::new();
    for rule in rules {
        prompt.push_str(&rule.content);
        prompt.push('\n');
    }
    if !skills_block.is_empty() {
        prompt.push_str(skills_block);
        prompt.push('\n');
    }
    prompt.push_str(&task.content);
    prompt
}

/// The `description` frontmatter, or else the first heading or paragraph of
/// the content outside code fences.
fn describe(doc: &Document) -> Option<String> {
    if let Some(description) = doc.frontmatter.get_str("description") {
        return Some(preview(description.trim())).filter(|d| !d.is_empty());
    }

    let mut paragraph: Vec<&str> = Vec::new();
    let mut in_fence = false;
    for line in doc.content.lines().map(str::trim) {
        if line.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        if line.is_empty() {
            if paragraph.is_empty() {
                continue;
            }
            break;
        }
        if let Some(heading) = line.strip_prefix('#') {
            if paragraph.is_empty() {
                paragraph.push(heading.trim_start_matches('#').trim());
            }
            break;
        }
        paragraph.push(line);
    }

    let text = paragraph.join(" ");
    (!text.is_empty()).then(|| preview(&text))
}

fn preview(text: &str) -> String {
    if text.chars().count() <= DESCRIPTION_PREVIEW {
        return text.to_string();
    }
    let cut: String = text.chars().take(DESCRIPTION_PREVIEW - 3).collect();
    format!("{cut}...")
}

// ---------------------------------------------------------------------------
// Per-run state
// ---------------------------------------------------------------------------

/// A directory searched with the agent table.
struct Base {
    dir: PathBuf,
    home: bool,
}

/// A file found below a base.
struct Candidate {
    path: PathBuf,
    relative: PathBuf,
}

struct Run<'r> {
    options: &'r Options,
    runner: &'r dyn ProcessRunner,
    bases: Vec<Base>,
    selectors: Selectors,
    agent: Option<Agent>,
}

impl<'r> Run<'r> {
    fn new(assembler: &'r Assembler<'_>, extra_roots: &[PathBuf]) -> Self {
        let options = &assembler.options;
        let mut bases = vec![Base {
            dir: options.work_dir.clone(),
            home: false,
        }];
        bases.extend(extra_roots.iter().map(|dir| Base {
            dir: dir.clone(),
            home: false,
        }));
        if let Some(home) = &options.home_dir {
            bases.push(Base {
                dir: home.clone(),
                home: true,
            });
        }

        Self {
            options,
            runner: assembler.runner,
            bases,
            selectors: options.selectors.clone(),
            agent: options.agent,
        }
    }

    /// Resume mode is on when asked for directly or through a `resume=true`
    /// selector.
    fn resuming(&self) -> bool {
        self.options.resume || self.selectors.contains("resume", "true")
    }

    // ----- Walking -----

    fn locations(&self, base: &Base, kind: Kind) -> Vec<PathBuf> {
        let table = &self.options.agents;
        if base.home && kind == Kind::Rules {
            return table.user_rules.iter().map(|p| base.dir.join(p)).collect();
        }
        table
            .locations(kind)
            .into_iter()
            .map(|p| base.dir.join(p))
            .collect()
    }

    /// Markdown files of `kind` across all bases, in search order. A file
    /// reachable through several roots is listed once.
    fn candidates(&self, kind: Kind) -> Result<Vec<Candidate>> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for base in &self.bases {
            for root in self.locations(base, kind) {
                for path in markdown_files(&root)? {
                    if !seen.insert(canonical(&path)) {
                        tracing::debug!(path = %path.display(), "already seen");
                        continue;
                    }
                    let relative = path.strip_prefix(&base.dir).unwrap_or(&path).to_path_buf();
                    out.push(Candidate { path, relative });
                }
            }
        }
        Ok(out)
    }

    /// The single file of `kind` named `name` that passes the selectors.
    fn find_named(&self, kind: Kind, name: &str, label: &'static str) -> Result<Option<Document>> {
        let mut found: Option<Document> = None;
        for candidate in self.candidates(kind)? {
            if file_stem(&candidate.path) != name {
                continue;
            }
            let doc = Document::load(&candidate.path)?;
            if !self.selectors.matches(&doc.frontmatter) {
                tracing::info!(path = %doc.path.display(), "skipping {label}: selectors do not match");
                continue;
            }
            if let Some(first) = &found {
                return Err(CtxError::Duplicate {
                    kind: label,
                    name: name.to_string(),
                    first: first.path.clone(),
                    second: doc.path,
                });
            }
            found = Some(doc);
        }
        Ok(found)
    }

    fn expand(&self, content: &str, params: &Params) -> String {
        Expander::new(params, self.runner, &self.options.work_dir).expand(content)
    }

    // ----- Task and commands -----

    fn task(&mut self, name: &str) -> Result<Document> {
        self.selectors.insert("task_name", name);
        if self.options.resume {
            self.selectors.insert("resume", "true");
        }

        let mut doc = self
            .find_named(Kind::Tasks, name, "task")?
            .ok_or_else(|| CtxError::TaskNotFound(name.to_string()))?;
        tracing::info!(path = %doc.path.display(), "found task");

        if let Some(selectors) = doc.frontmatter.selectors() {
            self.selectors.merge(selectors);
        }
        if let Some(agent) = doc.frontmatter.agent() {
            self.agent = Some(agent.parse()?);
        }

        let mut body = doc.content.clone();
        if let Some(prompt) = self.options.user_prompt.as_deref().filter(|p| !p.is_empty()) {
            if !body.is_empty() && !body.ends_with('\n') {
                body.push('\n');
            }
            body.push_str("---\n");
            body.push_str(prompt);
        }

        let parsed = parse_task(&body).map_err(|error| CtxError::TaskParse {
            path: doc.path.clone(),
            error,
        })?;

        let expand = doc.frontmatter.expand();
        let mut content = String::with_capacity(body.len());
        for block in &parsed.blocks {
            let text = match block {
                Block::Text(text) => text.content(),
                Block::SlashCommand(command) => match self.command(command)? {
                    Some(resolved) => {
                        content.push_str(&resolved);
                        continue;
                    }
                    None => command.inline.clone().unwrap_or_default(),
                },
            };
            if expand {
                content.push_str(&self.expand(&text, &self.options.params));
            } else {
                content.push_str(&text);
            }
        }

        doc.set_content(content);
        tracing::info!(tokens = doc.tokens, "including task");
        Ok(doc)
    }

    /// Resolve a slash command to its expanded file. `None` means an inline
    /// command with no file, which the caller keeps as text.
    fn command(&mut self, command: &SlashCommand) -> Result<Option<String>> {
        let Some(doc) = self.find_named(Kind::Commands, &command.name, "command")? else {
            if command.inline.is_some() {
                tracing::info!(command = %command.name, "no command file for inline slash, keeping it as text");
                return Ok(None);
            }
            return Err(CtxError::CommandNotFound(command.name.clone()));
        };
        tracing::info!(command = %command.name, path = %doc.path.display(), "resolved slash command");

        if let Some(selectors) = doc.frontmatter.selectors() {
            self.selectors.merge(selectors);
        }
        if !doc.frontmatter.expand() {
            return Ok(Some(doc.content));
        }
        let params = self.options.params.overlay(&command.params());
        Ok(Some(self.expand(&doc.content, &params)))
    }

    // ----- Rules -----

    fn rules(&self) -> Result<Vec<Document>> {
        let mut rules = Vec::new();
        for candidate in self.candidates(Kind::Rules)? {
            if let Some(agent) = self.agent {
                if self.options.agents.is_native(agent, &candidate.relative) {
                    tracing::info!(path = %candidate.path.display(), %agent, "skipping rule read natively by agent");
                    continue;
                }
            }

            let mut doc = Document::load(&candidate.path)?;
            if !self.selectors.matches(&doc.frontmatter) {
                tracing::info!(path = %doc.path.display(), "skipping rule: selectors do not match");
                continue;
            }

            self.bootstrap(&doc)?;

            if doc.frontmatter.expand() {
                let content = self.expand(&doc.content, &self.options.params);
                doc.set_content(content);
            }
            tracing::info!(path = %doc.path.display(), tokens = doc.tokens, "including rule");
            rules.push(doc);
        }
        Ok(rules)
    }

    /// Run the rule's inline `bootstrap:` script, or else its sibling
    /// `<stem>-bootstrap` file if one exists.
    fn bootstrap(&self, rule: &Document) -> Result<()> {
        let (bootstrap, label) = match rule.frontmatter.bootstrap() {
            Some(script) => (Bootstrap::Inline(script.to_string()), rule.path.clone()),
            None => {
                let script = bootstrap_path(&rule.path);
                if !script.is_file() {
                    return Ok(());
                }
                make_executable(&script)?;
                (Bootstrap::Script(script.clone()), script)
            }
        };

        tracing::info!(path = %label.display(), "running bootstrap");
        let result = self.runner.run_bootstrap(&bootstrap, &self.options.work_dir);
        if !result.success {
            return Err(CtxError::BootstrapFailed {
                path: label,
                output: result.output,
            });
        }
        Ok(())
    }

    // ----- Skills -----

    fn skills(&self) -> Result<Vec<Skill>> {
        let mut seen = HashSet::new();
        let mut skills = Vec::new();
        for base in &self.bases {
            for root in self.locations(base, Kind::Skills) {
                if !root.is_dir() {
                    continue;
                }
                let walker = WalkDir::new(&root)
                    .min_depth(1)
                    .max_depth(1)
                    .sort_by_file_name();
                for entry in walker {
                    let file = entry?.path().join(SKILL_FILE);
                    if !file.is_file() || !seen.insert(canonical(&file)) {
                        continue;
                    }
                    let doc = Document::load(&file)?;
                    if !self.selectors.matches(&doc.frontmatter) {
                        tracing::info!(path = %file.display(), "skipping skill: selectors do not match");
                        continue;
                    }
                    let skill = Skill::from_document(doc)?;
                    tracing::info!(skill = %skill.name, "including skill");
                    skills.push(skill);
                }
            }
        }
        Ok(skills)
    }
}

// ---------------------------------------------------------------------------
// Filesystem helpers
// ---------------------------------------------------------------------------

/// Markdown files under `root` sorted by name. A root that is a file is
/// returned as-is whatever its extension, so `.cursorrules` works.
fn markdown_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(vec![root.to_path_buf()]);
    }
    if !root.is_dir() {
        return Ok(Vec::new());
    }
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(true).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_markdown(entry.path()) {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn is_markdown(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| MARKDOWN_EXTENSIONS.contains(&e))
}

fn canonical(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

fn file_stem(path: &Path) -> &str {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or_default()
}

/// `rules/setup.md` -> `rules/setup-bootstrap`.
fn bootstrap_path(rule: &Path) -> PathBuf {
    let mut name = rule.file_stem().unwrap_or_default().to_os_string();
    name.push("-bootstrap");
    rule.with_file_name(name)
}

#[cfg(unix)]
fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let mut permissions = std::fs::metadata(path)?.permissions();
    permissions.set_mode(0o755);
    std::fs::set_permissions(path, permissions)?;
    Ok(())
}

#[cfg(not(unix))]
fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
