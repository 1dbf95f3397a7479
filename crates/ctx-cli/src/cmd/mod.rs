pub mod list;
pub mod run;

use clap::Args;
use ctx_core::Options;
use std::path::Path;

/// Where to look beyond the working directory. Shared by `run` and `list`.
#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Extra search path: a directory, file:// URL, git source or http(s) URL (repeatable)
    #[arg(short = 'd', long = "search-path", value_name = "PATH")]
    pub search_paths: Vec<String>,

    /// File or URL listing more search paths, one per line
    #[arg(short = 'm', long = "manifest", value_name = "URL")]
    pub manifest: Option<String>,
}

impl SearchArgs {
    pub fn options(&self, dir: &Path) -> Options {
        Options {
            work_dir: dir.to_path_buf(),
            home_dir: home::home_dir(),
            search_paths: self.search_paths.clone(),
            manifest_url: self.manifest.clone(),
            ..Options::default()
        }
    }
}
