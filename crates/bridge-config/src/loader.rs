//! Multi-file configuration loading.
//!
//! The entry file and any file it includes may themselves carry an `include`
//! key. All files are merged into one table before parsing; a top-level
//! section may appear in only one of them.

use crate::{resolve_env_vars, Config, ConfigError};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::{Path, PathBuf};

/// Loads a configuration file together with everything it includes.
pub(crate) struct ConfigLoader {
	base_path: PathBuf,
	/// Canonical paths already read.
	visited: HashSet<PathBuf>,
	/// File each top-level section came from.
	origins: HashMap<String, PathBuf>,
}

impl ConfigLoader {
	pub(crate) fn new(base_path: impl AsRef<Path>) -> Self {
		Self {
			base_path: base_path.as_ref().to_path_buf(),
			visited: HashSet::new(),
			origins: HashMap::new(),
		}
	}

	pub(crate) async fn load_config(
		&mut self,
		entry: impl AsRef<Path>,
	) -> Result<Config, ConfigError> {
		let mut merged = toml::Table::new();
		let mut queue = VecDeque::from([self.resolve(&self.base_path, entry.as_ref())]);

		while let Some(path) = queue.pop_front() {
			let mut table = self.read_table(&path).await?;
			let dir = path.parent().unwrap_or(self.base_path.as_path()).to_path_buf();
			for include in take_includes(&mut table)? {
				queue.push_back(self.resolve(&dir, &include));
			}
			self.merge(&mut merged, table, &path)?;
		}

		let rendered = toml::to_string(&merged).map_err(|e| {
			ConfigError::Parse(format!("Failed to serialize combined config: {}", e))
		})?;
		rendered.parse()
	}

	fn resolve(&self, dir: &Path, path: &Path) -> PathBuf {
		if path.is_absolute() {
			path.to_path_buf()
		} else {
			dir.join(path)
		}
	}

	async fn read_table(&mut self, path: &Path) -> Result<toml::Table, ConfigError> {
		let canonical = tokio::fs::canonicalize(path).await.map_err(|e| {
			ConfigError::Io(std::io::Error::new(
				e.kind(),
				format!("Configuration file not found: {}: {}", path.display(), e),
			))
		})?;
		if !self.visited.insert(canonical.clone()) {
			return Err(ConfigError::Validation(format!(
				"Circular include detected: {} was already loaded",
				canonical.display()
			)));
		}

		let content = tokio::fs::read_to_string(&canonical).await?;
		let resolved = resolve_env_vars(&content)?;
		Ok(toml::from_str(&resolved)?)
	}

	fn merge(
		&mut self,
		merged: &mut toml::Table,
		table: toml::Table,
		source: &Path,
	) -> Result<(), ConfigError> {
		for (section, value) in table {
			if let Some(first) = self.origins.get(&section) {
				return Err(ConfigError::Validation(format!(
					"Duplicate section '{}' found in {} and {}",
					section,
					first.display(),
					source.display()
				)));
			}
			self.origins.insert(section.clone(), source.to_path_buf());
			merged.insert(section, value);
		}
		Ok(())
	}
}

/// Removes the `include` key and returns the paths it named.
fn take_includes(table: &mut toml::Table) -> Result<Vec<PathBuf>, ConfigError> {
	match table.remove("include") {
		None => Ok(Vec::new()),
		Some(toml::Value::String(path)) => Ok(vec![PathBuf::from(path)]),
		Some(toml::Value::Array(items)) => items
			.into_iter()
			.map(|item| match item {
				toml::Value::String(path) => Ok(PathBuf::from(path)),
				_ => Err(ConfigError::Validation(
					"Include array must contain only strings".into(),
				)),
			})
			.collect(),
		Some(_) => Err(ConfigError::Validation(
			"Include must be a string or array of strings".into(),
		)),
	}
}
