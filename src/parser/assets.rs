//! Cover/background/video asset resolution around a chart file.

use crate::fs::SongFs;
use crate::song::Song;
use once_cell::sync::Lazy;
use regex::Regex;

static COVER_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(cover|album|label|\[co\])\.(png|jpeg|jpg|svg)$").unwrap());
static BACKGROUND_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(background|bg|\[bg\])?\.(png|jpeg|jpg|svg)$").unwrap());
static VIDEO_FILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^.*\.(avi|mpg|mpeg|flv|mov|mp4)$").unwrap());

/// Drop declared assets that do not exist, then guess undeclared ones from
/// the song directory.
///
/// The guess takes the first matching file name per asset kind in the order
/// the directory listing yields them; when several candidates exist the
/// outcome is therefore platform-dependent. A file is claimed by at most one
/// kind, cover first.
pub fn resolve_assets(song: &mut Song, fs: &dyn SongFs) {
    for asset in [&mut song.cover, &mut song.background, &mut song.video] {
        if !asset.is_empty() && !fs.exists(&song.path.join(asset.as_str())) {
            log::debug!("declared asset {asset:?} does not exist, ignoring");
            asset.clear();
        }
    }
    if !song.cover.is_empty() && !song.background.is_empty() && !song.video.is_empty() {
        return;
    }
    let names = match fs.list_dir(&song.path) {
        Ok(names) => names,
        Err(err) => {
            log::debug!("cannot list song directory {:?}: {err}", song.path);
            return;
        }
    };
    for name in names {
        if song.cover.is_empty() && COVER_FILE.is_match(&name) {
            song.cover = name;
        } else if song.background.is_empty() && BACKGROUND_FILE.is_match(&name) {
            song.background = name;
        } else if song.video.is_empty() && VIDEO_FILE.is_match(&name) {
            song.video = name;
        }
    }
}
