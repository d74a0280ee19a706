//! Character description precheck.
//!
//! Before any scene is generated, every character that has a reference
//! image but no description derived from that image gets one from the
//! service. Requests run concurrently up to a configured limit. A single
//! failure aborts the run before the first scene starts.

use futures::stream::{self, StreamExt};
use reelforge_core::service::{GenerationService, ServiceError};
use reelforge_core::types::Character;

use crate::error::PipelineError;
use crate::observer::StatusObserver;

/// Resolve missing character descriptions in place.
///
/// Returns the number of characters resolved. Descriptions that were
/// resolved before a failure are still written back, so a rerun does not
/// request them again.
pub async fn resolve_descriptions(
    service: &dyn GenerationService,
    characters: &mut [Character],
    concurrency: usize,
    observer: &dyn StatusObserver,
) -> Result<usize, PipelineError> {
    let targets: Vec<(usize, String, _)> = characters
        .iter()
        .enumerate()
        .filter(|(_, c)| c.is_named() && c.needs_description())
        .filter_map(|(i, c)| {
            c.reference_image
                .clone()
                .map(|image| (i, c.name.trim().to_string(), image))
        })
        .collect();

    if targets.is_empty() {
        tracing::debug!("All character descriptions already locked");
        return Ok(0);
    }

    tracing::info!(
        count = targets.len(),
        concurrency,
        "Resolving character descriptions",
    );

    let mut results: Vec<_> = stream::iter(targets)
        .map(|(index, name, image)| async move {
            let result = service.describe_character(&name, &image).await;
            (index, name, result)
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;
    results.sort_by_key(|(index, _, _)| *index);

    let mut resolved = 0;
    let mut first_error = None;
    for (index, name, result) in results {
        let result = result.and_then(|description| {
            let description = description.trim();
            if description.is_empty() {
                Err(ServiceError::Decode(format!(
                    "empty description returned for {name}"
                )))
            } else {
                Ok(description.to_string())
            }
        });
        match result {
            Ok(description) => {
                let character = &mut characters[index];
                character.lock_description(description);
                tracing::info!(character = %name, "Character description locked");
                observer.character_locked(character);
                resolved += 1;
            }
            Err(e) => {
                tracing::error!(character = %name, error = %e, "Character description failed");
                if first_error.is_none() {
                    first_error = Some(PipelineError::Precheck {
                        character: name,
                        source: e,
                    });
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(resolved),
    }
}
