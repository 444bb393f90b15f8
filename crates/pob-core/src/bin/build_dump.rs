#[cfg(feature = "dump")]
mod real {
    use pob_core::{Build, GemCatalog, LoadError, LoadStage, load_build, parse_build};
    use serde::Serialize;
    use std::fs;
    use std::path::{Path, PathBuf};

    #[derive(Serialize)]
    struct SkillSetSummary<'a> {
        title: &'a str,
        total_gems: usize,
        active_gems: usize,
        support_gems: usize,
    }

    #[derive(Serialize)]
    struct DumpReport<'a> {
        build: &'a Build,
        skill_sets: Vec<SkillSetSummary<'a>>,
        important_mods: Vec<(String, Vec<String>)>,
    }

    fn load(path: &Path, gems: &GemCatalog) -> Result<Build, LoadError> {
        let contents = fs::read_to_string(path).unwrap_or_else(|e| {
            eprintln!("error: cannot read {}: {e}", path.display());
            std::process::exit(2);
        });
        if contents.trim_start().starts_with('<') {
            Ok(parse_build(&contents, gems)?)
        } else {
            load_build(&contents, gems)
        }
    }

    fn run() -> Result<(), LoadError> {
        let mut args = std::env::args().skip(1);
        let Some(input) = args.next() else {
            eprintln!("usage: build_dump <paste-code-or-xml-file> [gems.json]");
            std::process::exit(2);
        };

        let gems = match args.next() {
            Some(path) => {
                let json = fs::read_to_string(&path).unwrap_or_else(|e| {
                    eprintln!("error: cannot read {path}: {e}");
                    std::process::exit(2);
                });
                GemCatalog::from_json(&json).unwrap_or_else(|e| {
                    eprintln!("error: invalid gem catalog {path}: {e}");
                    std::process::exit(2);
                })
            }
            None => GemCatalog::new(),
        };

        let build = load(&PathBuf::from(input), &gems)?;
        let report = DumpReport {
            build: &build,
            skill_sets: build
                .skill_sets
                .iter()
                .map(|set| SkillSetSummary {
                    title: &set.title,
                    total_gems: set.total_gems(),
                    active_gems: set.active_gems(),
                    support_gems: set.support_gems(),
                })
                .collect(),
            important_mods: build
                .active_item_set()
                .map(|set| {
                    set.items
                        .iter()
                        .map(|item| (item.slot.clone(), item.important_mods()))
                        .collect()
                })
                .unwrap_or_default(),
        };

        let output = serde_json::to_string_pretty(&report).expect("serialize report");
        println!("{output}");
        Ok(())
    }

    pub fn main() {
        if let Err(err) = run() {
            let stage = match err.stage() {
                LoadStage::Decode => "decode",
                LoadStage::Decompress => "decompress",
                LoadStage::Xml => "xml parse",
            };
            eprintln!("error ({stage}): {err}");
            std::process::exit(1);
        }
    }
}

#[cfg(feature = "dump")]
fn main() {
    real::main();
}

#[cfg(not(feature = "dump"))]
fn main() {
    eprintln!("build_dump requires `--features dump`");
    std::process::exit(2);
}
