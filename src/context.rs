//! Context file loading and deterministic randomized selection (spec §4.3).

use std::collections::BTreeMap;
use std::hash::Hasher;
use std::path::{Path, PathBuf};

use fnv::FnvHasher;
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use crate::error::ContextLoaderError;
use crate::logging::RunLogger;
use crate::state::SelectedContext;

#[derive(Debug, Clone, Default)]
pub struct ContextSelection {
    /// Relative path (forward-slash normalized) -> file contents. Includes
    /// `lore_bible.md` and all `style/*.md` files, sorted by filename.
    pub always_loaded: BTreeMap<String, String>,
    pub selected_location: Option<String>,
    pub selected_characters: Vec<String>,
    pub location_content: Option<String>,
    pub character_contents: BTreeMap<String, String>,
    pub world_files: Vec<String>,
    pub world_contents: BTreeMap<String, String>,
}

impl ContextSelection {
    pub fn to_selected_context(&self) -> SelectedContext {
        SelectedContext {
            location: self.selected_location.clone(),
            characters: self.selected_characters.clone(),
            world_files: self.world_files.clone(),
        }
    }

    pub fn lore_bible(&self) -> &str {
        self.always_loaded
            .get("lore_bible.md")
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// All always-loaded style files concatenated, in sorted order.
    pub fn style_rules(&self) -> String {
        self.always_loaded
            .iter()
            .filter(|(path, _)| path.starts_with("style/"))
            .map(|(_, content)| content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn location_context(&self) -> &str {
        self.location_content.as_deref().unwrap_or_default()
    }

    pub fn character_context(&self) -> String {
        self.character_contents
            .values()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join("\n\n")
    }
}

/// Deterministic, stable (not language-default) hash of `run_id`, reduced
/// mod 2^32, used to seed the selection PRNG (spec §4.3, §9).
pub fn seed_from_run_id(run_id: &str) -> u64 {
    let mut hasher = FnvHasher::default();
    hasher.write(run_id.as_bytes());
    hasher.finish() % (1u64 << 32)
}

pub struct ContextLoader<'a> {
    context_dir: PathBuf,
    logger: Option<&'a RunLogger>,
    fold_world_files: bool,
}

impl<'a> ContextLoader<'a> {
    pub fn new(context_dir: impl Into<PathBuf>, logger: Option<&'a RunLogger>) -> Self {
        Self {
            context_dir: context_dir.into(),
            logger,
            fold_world_files: false,
        }
    }

    pub fn with_fold_world_files(mut self, fold: bool) -> Self {
        self.fold_world_files = fold;
        self
    }

    pub fn load_context(&self, run_id: &str) -> Result<ContextSelection, ContextLoaderError> {
        let seed = seed_from_run_id(run_id);
        let mut rng = StdRng::seed_from_u64(seed);

        let always_loaded = self.load_always_required()?;
        let (selected_location, location_content) = self.select_location(&mut rng)?;
        let (selected_characters, character_contents) = self.select_characters(&mut rng)?;
        let (world_files, world_contents) = if self.fold_world_files {
            self.load_world_files()?
        } else {
            (Vec::new(), BTreeMap::new())
        };

        if let Some(logger) = self.logger {
            logger.log_context_selection(
                &always_loaded.keys().cloned().collect::<Vec<_>>(),
                selected_location.as_deref(),
                &selected_characters,
            );
        }

        Ok(ContextSelection {
            always_loaded,
            selected_location,
            selected_characters,
            location_content,
            character_contents,
            world_files,
            world_contents,
        })
    }

    fn load_always_required(&self) -> Result<BTreeMap<String, String>, ContextLoaderError> {
        let mut always_loaded = BTreeMap::new();

        let lore_bible_path = self.context_dir.join("lore_bible.md");
        if !lore_bible_path.exists() {
            return Err(ContextLoaderError::LoreBibleMissing(lore_bible_path));
        }
        always_loaded.insert("lore_bible.md".to_string(), read_file(&lore_bible_path)?);

        let style_dir = self.context_dir.join("style");
        if style_dir.is_dir() {
            for path in sorted_md_files(&style_dir) {
                let rel = normalize_rel_path(&self.context_dir, &path);
                let content = read_file(&path)?;
                always_loaded.insert(rel, content);
            }
        }

        Ok(always_loaded)
    }

    fn load_world_files(&self) -> Result<(Vec<String>, BTreeMap<String, String>), ContextLoaderError> {
        let world_dir = self.context_dir.join("world");
        if !world_dir.is_dir() {
            return Ok((Vec::new(), BTreeMap::new()));
        }
        let mut names = Vec::new();
        let mut contents = BTreeMap::new();
        for path in sorted_md_files(&world_dir) {
            let rel = normalize_rel_path(&self.context_dir, &path);
            contents.insert(rel.clone(), read_file(&path)?);
            names.push(rel);
        }
        Ok((names, contents))
    }

    fn select_location(
        &self,
        rng: &mut StdRng,
    ) -> Result<(Option<String>, Option<String>), ContextLoaderError> {
        let locations_dir = self.context_dir.join("locations");
        if !locations_dir.is_dir() {
            return Ok((None, None));
        }
        let files = sorted_md_files(&locations_dir);
        if files.is_empty() {
            return Ok((None, None));
        }
        let idx = rng.gen_range(0..files.len());
        let selected = &files[idx];
        let rel = normalize_rel_path(&self.context_dir, selected);
        let content = read_file(selected)?;
        Ok((Some(rel), Some(content)))
    }

    fn select_characters(
        &self,
        rng: &mut StdRng,
    ) -> Result<(Vec<String>, BTreeMap<String, String>), ContextLoaderError> {
        let characters_dir = self.context_dir.join("characters");
        if !characters_dir.is_dir() {
            return Ok((Vec::new(), BTreeMap::new()));
        }
        let files = sorted_md_files(&characters_dir);
        if files.is_empty() {
            return Ok((Vec::new(), BTreeMap::new()));
        }

        let num_to_select = rng.gen_range(2..=3).min(files.len());
        let mut shuffled = files.clone();
        shuffled.shuffle(rng);
        let selected = &shuffled[..num_to_select];

        if selected.len() < 2 {
            if let Some(logger) = self.logger {
                logger.warn(format!(
                    "only {} character file(s) available (expected 2-3); selected all available",
                    selected.len()
                ));
            }
        }

        let mut paths = Vec::new();
        let mut contents = BTreeMap::new();
        for path in selected {
            let rel = normalize_rel_path(&self.context_dir, path);
            contents.insert(rel.clone(), read_file(path)?);
            paths.push(rel);
        }
        paths.sort();
        Ok((paths, contents))
    }
}

fn sorted_md_files(dir: &Path) -> Vec<PathBuf> {
    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .into_iter()
        .flatten()
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "md"))
        .collect();
    files.sort();
    files
}

fn normalize_rel_path(base: &Path, path: &Path) -> String {
    path.strip_prefix(base)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn read_file(path: &Path) -> Result<String, ContextLoaderError> {
    std::fs::read_to_string(path).map_err(|source| ContextLoaderError::ReadFailure {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn write(dir: &Path, rel: &str, content: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn missing_lore_bible_is_fatal() {
        let dir = tempdir().unwrap();
        let loader = ContextLoader::new(dir.path(), None);
        let err = loader.load_context("run-1").unwrap_err();
        assert!(matches!(err, ContextLoaderError::LoreBibleMissing(_)));
    }

    #[test]
    fn same_run_id_yields_same_selection() {
        let dir = tempdir().unwrap();
        write(dir.path(), "lore_bible.md", "lore");
        for name in ["a", "b", "c", "d"] {
            write(dir.path(), &format!("characters/{name}.md"), name);
        }
        for name in ["loc1", "loc2"] {
            write(dir.path(), &format!("locations/{name}.md"), name);
        }

        let loader = ContextLoader::new(dir.path(), None);
        let first = loader.load_context("stable-run-id").unwrap();
        let second = loader.load_context("stable-run-id").unwrap();

        assert_eq!(first.selected_location, second.selected_location);
        assert_eq!(first.selected_characters, second.selected_characters);
    }

    #[test]
    fn absent_locations_and_characters_are_non_fatal() {
        let dir = tempdir().unwrap();
        write(dir.path(), "lore_bible.md", "lore");
        let loader = ContextLoader::new(dir.path(), None);
        let selection = loader.load_context("run-1").unwrap();
        assert_eq!(selection.selected_location, None);
        assert!(selection.selected_characters.is_empty());
    }

    #[test]
    fn selects_two_or_three_characters_when_available() {
        let dir = tempdir().unwrap();
        write(dir.path(), "lore_bible.md", "lore");
        for name in ["a", "b", "c", "d", "e"] {
            write(dir.path(), &format!("characters/{name}.md"), name);
        }
        let loader = ContextLoader::new(dir.path(), None);
        let selection = loader.load_context("run-1").unwrap();
        assert!((2..=3).contains(&selection.selected_characters.len()));
    }
}
