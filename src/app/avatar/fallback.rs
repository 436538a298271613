use std::{fmt::Debug, io, path::PathBuf};

use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::{context::RenderContext, AvatarError};

/// How default avatars are varied for users without a gravatar.
#[derive(
    clap::ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize,
)]
#[clap(rename_all = "kebab_case")]
#[serde(rename_all = "lowercase")]
pub enum RandomDefault {
    /// Always the same static default image
    #[default]
    Off,
    /// One random image per user, per page
    Normal,
    /// A new random image every time, even for the same user on the same page
    Extreme,
}

/// Lists the images a random default can be picked from.
pub trait ImageFolder: Debug + Send + Sync {
    fn list_filenames(&self) -> io::Result<Vec<String>>;
}

/// Image folder on the local filesystem.
#[derive(Debug, Clone)]
pub struct DirImageFolder {
    path: PathBuf,
}

impl DirImageFolder {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ImageFolder for DirImageFolder {
    fn list_filenames(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();

        for entry in std::fs::read_dir(&self.path)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }

            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_owned());
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Pick a default image filename for `user_id`.
///
/// The folder is listed at most once per render. Unless the policy is
/// [`RandomDefault::Extreme`], a user keeps the first image picked for them.
#[tracing::instrument(name = "Selecting random default avatar", skip(ctx, folder))]
pub fn select_random_default(
    ctx: &mut RenderContext,
    user_id: i64,
    policy: RandomDefault,
    folder: &dyn ImageFolder,
) -> Result<String, AvatarError> {
    if policy != RandomDefault::Extreme {
        if let Some(filename) = ctx.cache.assigned(user_id) {
            return Ok(filename.to_owned());
        }
    }

    if ctx.cache.random_avatars.is_none() {
        let filenames = folder.list_filenames().map_err(AvatarError::ImageFolder)?;
        tracing::debug!(count = filenames.len(), "Listed default avatars");

        // Only a usable listing is kept for the rest of the page
        if filenames.is_empty() {
            return Err(AvatarError::NoFallbackImages);
        }
        ctx.cache.random_avatars = Some(filenames);
    }

    let RenderContext { cache, rng, .. } = ctx;

    let chosen = cache
        .random_avatars
        .as_deref()
        .and_then(|filenames| filenames.choose(rng))
        .cloned()
        .ok_or(AvatarError::NoFallbackImages)?;

    cache.avatar_set.insert(user_id, chosen.clone());

    Ok(chosen)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    #[derive(Debug, Default)]
    struct FakeFolder {
        filenames: Vec<String>,
        listed: AtomicUsize,
    }

    impl FakeFolder {
        fn with(filenames: &[&str]) -> Self {
            Self {
                filenames: filenames.iter().map(|f| f.to_string()).collect(),
                listed: AtomicUsize::new(0),
            }
        }
    }

    impl ImageFolder for FakeFolder {
        fn list_filenames(&self) -> io::Result<Vec<String>> {
            self.listed.fetch_add(1, Ordering::SeqCst);
            Ok(self.filenames.clone())
        }
    }

    #[derive(Debug)]
    struct BrokenFolder;

    impl ImageFolder for BrokenFolder {
        fn list_filenames(&self) -> io::Result<Vec<String>> {
            Err(io::Error::new(io::ErrorKind::NotFound, "missing"))
        }
    }

    fn many_images() -> FakeFolder {
        FakeFolder::with(&[
            "a.png", "b.png", "c.png", "d.png", "e.png", "f.png", "g.png", "h.png",
        ])
    }

    #[test]
    fn test_normal_keeps_user_image_for_page() {
        let folder = many_images();
        let mut ctx = RenderContext::with_seed(7);

        let first = select_random_default(&mut ctx, 1, RandomDefault::Normal, &folder).unwrap();
        for _ in 0..20 {
            let again =
                select_random_default(&mut ctx, 1, RandomDefault::Normal, &folder).unwrap();
            assert_eq!(first, again);
        }
        assert_eq!(ctx.cache().assigned(1), Some(first.as_str()));
    }

    #[test]
    fn test_extreme_varies_for_same_user() {
        let folder = many_images();
        let mut ctx = RenderContext::with_seed(7);

        let picks: Vec<String> = (0..50)
            .map(|_| select_random_default(&mut ctx, 1, RandomDefault::Extreme, &folder).unwrap())
            .collect();

        assert!(picks.iter().any(|p| p != &picks[0]));
    }

    #[test]
    fn test_extreme_overwrites_assignment() {
        let folder = many_images();
        let mut ctx = RenderContext::with_seed(3);

        for _ in 0..10 {
            let pick =
                select_random_default(&mut ctx, 9, RandomDefault::Extreme, &folder).unwrap();
            assert_eq!(ctx.cache().assigned(9), Some(pick.as_str()));
        }
    }

    #[test]
    fn test_pick_is_always_listed() {
        let folder = many_images();
        let mut ctx = RenderContext::with_seed(11);

        for user_id in 0..100 {
            let pick =
                select_random_default(&mut ctx, user_id, RandomDefault::Normal, &folder).unwrap();
            assert!(folder.filenames.contains(&pick));
        }
    }

    #[test]
    fn test_folder_listed_once_per_render() {
        let folder = many_images();
        let mut ctx = RenderContext::with_seed(1);

        for user_id in 0..10 {
            select_random_default(&mut ctx, user_id, RandomDefault::Extreme, &folder).unwrap();
        }

        assert_eq!(folder.listed.load(Ordering::SeqCst), 1);
        assert_eq!(ctx.cache().listing().map(<[String]>::len), Some(8));
    }

    #[test]
    fn test_empty_folder_fails() {
        let folder = FakeFolder::with(&[]);
        let mut ctx = RenderContext::with_seed(1);

        let res = select_random_default(&mut ctx, 1, RandomDefault::Normal, &folder);

        assert!(matches!(res, Err(AvatarError::NoFallbackImages)));
        assert!(ctx.cache().listing().is_none());
    }

    #[test]
    fn test_unreadable_folder_fails() {
        let mut ctx = RenderContext::with_seed(1);

        let res = select_random_default(&mut ctx, 1, RandomDefault::Normal, &BrokenFolder);

        assert!(matches!(res, Err(AvatarError::ImageFolder(_))));
    }

    #[test]
    fn test_dir_folder_lists_files_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.png"), b"png").unwrap();
        std::fs::write(dir.path().join("a.png"), b"png").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let folder = DirImageFolder::new(dir.path());

        assert_eq!(folder.list_filenames().unwrap(), vec!["a.png", "b.png"]);
    }
}
