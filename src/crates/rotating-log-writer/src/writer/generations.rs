use crate::error::{Result, WriterError};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

/// A rotated-out former active file, `path.<index>`.
///
/// Index 0 is the most recently rotated file; higher indices are older.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Generation {
    pub index: u64,
    pub path: PathBuf,
}

/// Builds the path of generation `index` for the active file at `base`.
pub fn generation_path(base: &Path, index: u64) -> PathBuf {
    let mut name = OsString::from(base.as_os_str());
    name.push(format!(".{index}"));
    PathBuf::from(name)
}

/// Extracts the generation index from `candidate` if it names a generation of
/// the file called `base`.
///
/// Only `<base>.<index>` with `index` written exactly as `generation_path`
/// writes it qualifies. Anything else (`<base>.bak`, `<base>.-1`, `<base>.07`,
/// `<base>.`, an index that overflows `u64`) is not a generation. Neither is
/// `u64::MAX`, which has no successor to shift into.
pub fn parse_generation(base: &str, candidate: &str) -> Option<u64> {
    let suffix = candidate.strip_prefix(base)?.strip_prefix('.')?;
    if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if suffix.len() > 1 && suffix.starts_with('0') {
        return None;
    }
    suffix.parse().ok().filter(|&index| index < u64::MAX)
}

fn split_base(base: &Path) -> (PathBuf, Option<&str>) {
    let dir = match base.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    (dir, base.file_name().and_then(|name| name.to_str()))
}

/// Lists the generations of the active file at `base`, sorted newest first.
pub fn discover(base: &Path) -> Result<Vec<Generation>> {
    let (dir, file_name) = split_base(base);
    let Some(file_name) = file_name else {
        return Ok(Vec::new());
    };

    let discover_err = |source: std::io::Error| WriterError::Discover {
        dir: dir.clone(),
        source,
    };

    let mut generations = Vec::new();
    for entry in std::fs::read_dir(&dir).map_err(discover_err)? {
        let entry = entry.map_err(discover_err)?;

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };

        let Some(index) = parse_generation(file_name, name) else {
            continue;
        };

        generations.push(Generation {
            index,
            path: base.with_file_name(name),
        });
    }

    generations.sort_by_key(|generation| generation.index);
    Ok(generations)
}

/// The full list of filesystem changes one rotation performs, computed up
/// front so that it can be inspected before anything moves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RotationPlan {
    /// Generations beyond the retention count, oldest last
    pub drop: Vec<PathBuf>,
    /// `N -> N+1` renames in descending `N`
    pub shift: Vec<(PathBuf, PathBuf)>,
    /// The active file and its destination, generation 0
    pub active: (PathBuf, PathBuf),
}

impl RotationPlan {
    /// Plans the rotation of `base` given its existing `generations` (sorted
    /// ascending by index) and the retention count.
    ///
    /// Only `keep_generations - 1` existing generations survive the shift, which
    /// leaves one slot for the active file becoming generation 0.
    pub fn new(base: &Path, mut generations: Vec<Generation>, keep_generations: usize) -> Self {
        let retained = keep_generations.saturating_sub(1);

        let drop = if generations.len() > retained {
            generations
                .split_off(retained)
                .into_iter()
                .map(|generation| generation.path)
                .collect()
        } else {
            Vec::new()
        };

        let shift = generations
            .iter()
            .rev()
            .map(|generation| {
                (
                    generation.path.clone(),
                    generation_path(base, generation.index + 1),
                )
            })
            .collect();

        Self {
            drop,
            shift,
            active: (base.to_path_buf(), generation_path(base, 0)),
        }
    }

    /// Applies the plan. Stops at the first failure; steps already taken are
    /// not undone.
    ///
    /// Runs under the writer's lock, so it must not emit tracing events.
    pub fn execute(&self) -> Result<()> {
        for path in &self.drop {
            std::fs::remove_file(path).map_err(|source| WriterError::Remove {
                path: path.clone(),
                source,
            })?;
        }

        for (from, to) in self.shift.iter().chain(std::iter::once(&self.active)) {
            std::fs::rename(from, to).map_err(|source| WriterError::Rename {
                from: from.clone(),
                to: to.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn generations(base: &Path, indices: &[u64]) -> Vec<Generation> {
        indices
            .iter()
            .map(|&index| Generation {
                index,
                path: generation_path(base, index),
            })
            .collect()
    }

    #[test]
    fn parse_numeric_suffixes() {
        assert_eq!(parse_generation("app.log", "app.log.0"), Some(0));
        assert_eq!(parse_generation("app.log", "app.log.12"), Some(12));
    }

    #[test]
    fn parse_rejects_malformed_suffixes() {
        assert_eq!(parse_generation("app.log", "app.log"), None);
        assert_eq!(parse_generation("app.log", "app.log."), None);
        assert_eq!(parse_generation("app.log", "app.log.bak"), None);
        assert_eq!(parse_generation("app.log", "app.log.-1"), None);
        assert_eq!(parse_generation("app.log", "app.log.+1"), None);
        assert_eq!(parse_generation("app.log", "app.log.007"), None);
        assert_eq!(parse_generation("app.log", "app.log.1.gz"), None);
        assert_eq!(parse_generation("app.log", "app.logx.1"), None);
        assert_eq!(parse_generation("app.log", "other.log.1"), None);
        assert_eq!(
            parse_generation("app.log", "app.log.99999999999999999999999"),
            None
        );
    }

    #[test]
    fn parse_rejects_index_without_successor() {
        let max = format!("app.log.{}", u64::MAX);
        assert_eq!(parse_generation("app.log", &max), None);

        let below_max = format!("app.log.{}", u64::MAX - 1);
        assert_eq!(parse_generation("app.log", &below_max), Some(u64::MAX - 1));
    }

    #[test]
    fn rotation_ignores_max_index_file() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");
        let stray = generation_path(&base, u64::MAX);

        fs::write(&base, b"active").unwrap();
        fs::write(generation_path(&base, 0), b"gen0").unwrap();
        fs::write(&stray, b"stray").unwrap();

        let found = discover(&base).unwrap();
        assert_eq!(found, generations(&base, &[0]));

        RotationPlan::new(&base, found, 10).execute().unwrap();

        assert_eq!(fs::read(generation_path(&base, 0)).unwrap(), b"active");
        assert_eq!(fs::read(generation_path(&base, 1)).unwrap(), b"gen0");
        assert_eq!(fs::read(&stray).unwrap(), b"stray");
    }

    #[test]
    fn generation_path_appends_index() {
        let base = Path::new("/var/log/app.log");
        assert_eq!(
            generation_path(base, 3),
            PathBuf::from("/var/log/app.log.3")
        );
    }

    #[test]
    fn discover_sorts_numerically() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        for name in ["app.log", "app.log.10", "app.log.2", "app.log.0", "app.log.old"] {
            fs::write(dir.path().join(name), b"").unwrap();
        }
        fs::write(dir.path().join("unrelated.log.1"), b"").unwrap();

        let found = discover(&base).unwrap();
        let indices: Vec<u64> = found.iter().map(|g| g.index).collect();
        assert_eq!(indices, vec![0, 2, 10]);
        assert_eq!(found[2].path, dir.path().join("app.log.10"));
    }

    #[test]
    fn discover_treats_glob_characters_literally() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app[1].log");

        fs::write(dir.path().join("app[1].log.0"), b"").unwrap();
        fs::write(dir.path().join("app1.log.0"), b"").unwrap();

        let found = discover(&base).unwrap();
        assert_eq!(found, generations(&base, &[0]));
    }

    #[test]
    fn discover_missing_directory_fails() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("missing").join("app.log");

        assert!(matches!(
            discover(&base),
            Err(WriterError::Discover { .. })
        ));
    }

    #[test]
    fn plan_without_generations() {
        let base = Path::new("/logs/app.log");
        let plan = RotationPlan::new(base, Vec::new(), 3);

        assert!(plan.drop.is_empty());
        assert!(plan.shift.is_empty());
        assert_eq!(
            plan.active,
            (base.to_path_buf(), PathBuf::from("/logs/app.log.0"))
        );
    }

    #[test]
    fn plan_shifts_oldest_first() {
        let base = Path::new("/logs/app.log");
        let plan = RotationPlan::new(base, generations(base, &[0, 1]), 3);

        assert!(plan.drop.is_empty());
        assert_eq!(
            plan.shift,
            vec![
                (
                    PathBuf::from("/logs/app.log.1"),
                    PathBuf::from("/logs/app.log.2")
                ),
                (
                    PathBuf::from("/logs/app.log.0"),
                    PathBuf::from("/logs/app.log.1")
                ),
            ]
        );
    }

    #[test]
    fn plan_drops_beyond_retention() {
        let base = Path::new("/logs/app.log");
        let plan = RotationPlan::new(base, generations(base, &[0, 1, 2, 3]), 2);

        assert_eq!(
            plan.drop,
            vec![
                PathBuf::from("/logs/app.log.1"),
                PathBuf::from("/logs/app.log.2"),
                PathBuf::from("/logs/app.log.3"),
            ]
        );
        assert_eq!(
            plan.shift,
            vec![(
                PathBuf::from("/logs/app.log.0"),
                PathBuf::from("/logs/app.log.1")
            )]
        );
    }

    #[test]
    fn plan_single_generation_drops_everything() {
        let base = Path::new("/logs/app.log");
        let plan = RotationPlan::new(base, generations(base, &[0, 4]), 1);

        assert_eq!(plan.drop.len(), 2);
        assert!(plan.shift.is_empty());
    }

    #[test]
    fn plan_keeps_gaps_in_numbering() {
        let base = Path::new("/logs/app.log");
        let plan = RotationPlan::new(base, generations(base, &[0, 5]), 3);

        assert!(plan.drop.is_empty());
        assert_eq!(
            plan.shift,
            vec![
                (
                    PathBuf::from("/logs/app.log.5"),
                    PathBuf::from("/logs/app.log.6")
                ),
                (
                    PathBuf::from("/logs/app.log.0"),
                    PathBuf::from("/logs/app.log.1")
                ),
            ]
        );
    }

    #[test]
    fn execute_moves_files() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        fs::write(&base, b"active").unwrap();
        fs::write(generation_path(&base, 0), b"gen0").unwrap();
        fs::write(generation_path(&base, 1), b"gen1").unwrap();

        let plan = RotationPlan::new(&base, discover(&base).unwrap(), 2);
        plan.execute().unwrap();

        assert!(!base.exists());
        assert_eq!(fs::read(generation_path(&base, 0)).unwrap(), b"active");
        assert_eq!(fs::read(generation_path(&base, 1)).unwrap(), b"gen0");
        assert_eq!(discover(&base).unwrap().len(), 2);
    }

    #[test]
    fn execute_fails_when_active_file_is_missing() {
        let dir = TempDir::new().unwrap();
        let base = dir.path().join("app.log");

        fs::write(generation_path(&base, 0), b"gen0").unwrap();

        let plan = RotationPlan::new(&base, discover(&base).unwrap(), 3);
        let err = plan.execute().unwrap_err();
        assert!(matches!(err, WriterError::Rename { ref from, .. } if from == &base));

        // The shift already happened and is not rolled back.
        assert!(generation_path(&base, 1).exists());
        assert!(!generation_path(&base, 0).exists());
    }
}
