//! Driver artifact resolution
//!
//! A descriptor names its driver either by a local jar path or by a
//! `group:artifact:version` coordinate. Both end up as a path to a jar.

use std::path::{Path, PathBuf};

use crate::config::{Properties, keys};
use crate::{Error, Result};

/// Turns a descriptor's driver artifact into a local jar path
pub trait DriverResolver: Send + Sync {
    /// Resolve `artifact` to a readable file
    ///
    /// # Errors
    ///
    /// Returns [`Error::DriverArtifact`] if nothing usable is found.
    fn resolve(&self, artifact: &str) -> Result<PathBuf>;
}

/// Resolves coordinates against a Maven-layout local repository
#[derive(Debug, Clone)]
pub struct LocalRepositoryResolver {
    repository: PathBuf,
}

impl LocalRepositoryResolver {
    /// Resolver rooted at `repository`
    pub fn new(repository: impl Into<PathBuf>) -> Self {
        Self {
            repository: repository.into(),
        }
    }

    /// Use `maven.repo.local`, falling back to `~/.m2/repository`
    pub fn from_properties(props: &Properties) -> Self {
        let repository = props
            .get(keys::MAVEN_REPO_LOCAL)
            .map(PathBuf::from)
            .unwrap_or_else(|| {
                dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join(".m2")
                    .join("repository")
            });
        Self::new(repository)
    }

    /// Repository root
    pub fn repository(&self) -> &Path {
        &self.repository
    }

    /// Repository path of a coordinate.
    ///
    /// Accepts `group:artifact:version` and `group:artifact:packaging:version`.
    pub fn coordinate_path(&self, coordinate: &str) -> Option<PathBuf> {
        let parts: Vec<&str> = coordinate.split(':').collect();
        let (group, artifact, packaging, version) = match parts.as_slice() {
            [g, a, v] => (*g, *a, "jar", *v),
            [g, a, p, v] => (*g, *a, *p, *v),
            _ => return None,
        };
        if [group, artifact, packaging, version]
            .iter()
            .any(|part| part.is_empty())
        {
            return None;
        }

        let mut path = self.repository.clone();
        path.extend(group.split('.'));
        path.push(artifact);
        path.push(version);
        path.push(format!("{}-{}.{}", artifact, version, packaging));
        Some(path)
    }
}

impl DriverResolver for LocalRepositoryResolver {
    fn resolve(&self, artifact: &str) -> Result<PathBuf> {
        let direct = Path::new(artifact);
        if direct.is_file() {
            return Ok(direct.to_path_buf());
        }

        match self.coordinate_path(artifact) {
            Some(path) if path.is_file() => {
                tracing::debug!("Resolved {} to {:?}", artifact, path);
                Ok(path)
            }
            Some(path) => Err(Error::driver_artifact(
                path,
                format!("{} is not present in the local repository", artifact),
            )),
            None => Err(Error::driver_artifact(
                artifact,
                "neither an existing file nor a group:artifact:version coordinate",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coordinate_layout() {
        let resolver = LocalRepositoryResolver::new("/repo");
        assert_eq!(
            resolver.coordinate_path("com.h2database:h2:2.2.224"),
            Some(PathBuf::from("/repo/com/h2database/h2/2.2.224/h2-2.2.224.jar"))
        );
        assert_eq!(
            resolver.coordinate_path("org.postgresql:postgresql:jar:42.7.3"),
            Some(PathBuf::from(
                "/repo/org/postgresql/postgresql/42.7.3/postgresql-42.7.3.jar"
            ))
        );
        assert_eq!(resolver.coordinate_path("just-a-name"), None);
        assert_eq!(resolver.coordinate_path("g::1.0"), None);
    }

    #[test]
    fn test_existing_file_is_returned_as_is() {
        let jar = tempfile::Builder::new().suffix(".jar").tempfile().unwrap();
        let resolver = LocalRepositoryResolver::new("/nowhere");
        let path = jar.path().to_str().unwrap();
        assert_eq!(resolver.resolve(path).unwrap(), jar.path());
    }

    #[test]
    fn test_coordinate_found_in_repository() {
        let repo = tempfile::tempdir().unwrap();
        let dir = repo.path().join("com/h2database/h2/2.2.224");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("h2-2.2.224.jar"), b"PK").unwrap();

        let resolver = LocalRepositoryResolver::new(repo.path());
        let path = resolver.resolve("com.h2database:h2:2.2.224").unwrap();
        assert_eq!(path, dir.join("h2-2.2.224.jar"));
    }

    #[test]
    fn test_missing_coordinate_is_fatal() {
        let repo = tempfile::tempdir().unwrap();
        let resolver = LocalRepositoryResolver::new(repo.path());
        let err = resolver.resolve("com.h2database:h2:0.0.1").unwrap_err();
        assert!(matches!(err, Error::DriverArtifact { .. }));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_repository_from_properties() {
        let props = Properties::new().with(keys::MAVEN_REPO_LOCAL, "/opt/m2");
        let resolver = LocalRepositoryResolver::from_properties(&props);
        assert_eq!(resolver.repository(), Path::new("/opt/m2"));
    }
}
