//! Render manifest assembled from a job's stage outputs.

use serde::{Deserialize, Serialize};

use crate::jobs::{Job, LogoPosition, MusicChoice};

pub const CANVAS_WIDTH: u32 = 1080;
pub const CANVAS_HEIGHT: u32 = 1920;
pub const VOICEOVER_VOLUME: f64 = 1.0;
pub const MUSIC_VOLUME: f64 = 0.2;

/// Everything the renderer needs to produce the final video.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub width: u32,
    pub height: u32,
    pub duration_seconds: f64,
    pub visuals: Visuals,
    pub audio: Vec<AudioTrack>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtitles_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logo: Option<Logo>,
}

/// Either timed stills or generated video clips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Visuals {
    Images { segments: Vec<VisualSegment> },
    Clips { urls: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSegment {
    pub image_url: String,
    pub start: f64,
    pub end: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AudioRole {
    Voiceover,
    Music,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioTrack {
    pub role: AudioRole,
    pub url: String,
    pub volume: f64,
    #[serde(default)]
    pub looped: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Logo {
    pub url: String,
    pub position: LogoPosition,
}

/// Why a manifest could not be built.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManifestError {
    #[error("Manifest requires {0}, which has not been produced")]
    Missing(&'static str),

    #[error("Invalid logo position: {0}")]
    InvalidLogo(String),
}

/// Builds the manifest from the job's voiceover, visuals, music, subtitles
/// and logo options.
///
/// Stills split the voiceover duration evenly in segment order. A
/// generated `video_url` takes precedence over stills.
pub fn build_manifest(job: &Job) -> Result<Manifest, ManifestError> {
    let voiceover = job
        .voiceover
        .as_ref()
        .ok_or(ManifestError::Missing("voiceover"))?;
    let duration = voiceover.duration_seconds.max(0.0);

    let visuals = match (&job.video_url, &job.media) {
        (Some(url), _) => Visuals::Clips {
            urls: vec![url.clone()],
        },
        (None, Some(media)) if !media.is_empty() => {
            let mut ordered: Vec<_> = media.iter().collect();
            ordered.sort_by_key(|m| m.index);
            let slot = duration / ordered.len() as f64;
            let segments = ordered
                .iter()
                .enumerate()
                .map(|(i, m)| VisualSegment {
                    image_url: m.url.clone(),
                    start: slot * i as f64,
                    end: if i + 1 == ordered.len() {
                        duration
                    } else {
                        slot * (i + 1) as f64
                    },
                })
                .collect();
            Visuals::Images { segments }
        }
        _ => return Err(ManifestError::Missing("visuals")),
    };

    let mut audio = vec![AudioTrack {
        role: AudioRole::Voiceover,
        url: voiceover.url.clone(),
        volume: VOICEOVER_VOLUME,
        looped: false,
    }];
    if let Some(MusicChoice::Track { url, .. }) = &job.music {
        audio.push(AudioTrack {
            role: AudioRole::Music,
            url: url.clone(),
            volume: MUSIC_VOLUME,
            looped: true,
        });
    }

    let style = &job.input.style;
    let logo = match &style.logo_url {
        Some(url) => {
            let position = match style.logo_position.as_deref() {
                Some(raw) => raw.parse().map_err(ManifestError::InvalidLogo)?,
                None => LogoPosition::End,
            };
            Some(Logo {
                url: url.clone(),
                position,
            })
        }
        None => None,
    };

    Ok(Manifest {
        width: CANVAS_WIDTH,
        height: CANVAS_HEIGHT,
        duration_seconds: duration,
        visuals,
        audio,
        subtitles_url: job.subtitles.as_ref().map(|s| s.url.clone()),
        logo,
    })
}
