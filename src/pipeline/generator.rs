//! Seed data producer.

use chrono::{DateTime, Utc};

use crate::models::{Album, Entity, Tag};

/// Names of the built-in tags, in identifier order starting at 1.
pub const SEED_TAG_NAMES: [&str; 15] = [
    "nature",
    "sunset",
    "portrait",
    "architecture",
    "landscape",
    "city",
    "animals",
    "macro",
    "black-and-white",
    "street",
    "people",
    "travel",
    "food",
    "sea",
    "mountains",
];

/// The fixed seed batch: one default album followed by the built-in tags.
pub fn seed_entities(now: DateTime<Utc>) -> Vec<Entity> {
    let mut entities = Vec::with_capacity(1 + SEED_TAG_NAMES.len());
    entities.push(Album::default_album(now).into());
    entities.extend(
        SEED_TAG_NAMES
            .iter()
            .zip(1i64..)
            .map(|(name, id)| Tag::new(id, *name, now).into()),
    );
    entities
}

/// Push the seed batch onto `tx`, then drop it so the channel closes once
/// every other sender is gone.
///
/// Returns how many entities were sent. Stops early only if every receiver
/// has been dropped.
pub async fn run_generator(tx: async_channel::Sender<Entity>) -> usize {
    let mut sent = 0;
    for entity in seed_entities(Utc::now()) {
        if tx.send(entity).await.is_err() {
            tracing::warn!(sent, "All workers gone, generator stopping early");
            return sent;
        }
        sent += 1;
    }
    tracing::debug!(sent, "Generation finished");
    sent
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EntityKind;

    #[test]
    fn test_seed_is_one_default_album_and_fifteen_tags() {
        let entities = seed_entities(Utc::now());
        assert_eq!(entities.len(), 16);

        match &entities[0] {
            Entity::Album(a) => {
                assert!(a.is_default());
                assert_eq!(a.id, 0);
            }
            other => panic!("expected album first, got {:?}", other.kind()),
        }

        let tags: Vec<_> = entities[1..]
            .iter()
            .map(|e| {
                assert_eq!(e.kind(), EntityKind::Tag);
                (e.id(), e.name().to_string())
            })
            .collect();
        assert_eq!(tags.first(), Some(&(1, "nature".to_string())));
        assert_eq!(tags.last(), Some(&(15, "mountains".to_string())));
    }

    #[test]
    fn test_seed_is_deterministic_apart_from_time() {
        let now = Utc::now();
        assert_eq!(seed_entities(now), seed_entities(now));
    }

    #[tokio::test]
    async fn test_generator_closes_channel() {
        let (tx, rx) = async_channel::bounded(4);
        let producer = tokio::spawn(run_generator(tx));

        let mut received = Vec::new();
        while let Ok(entity) = rx.recv().await {
            received.push(entity);
        }
        assert_eq!(producer.await.unwrap(), 16);
        assert_eq!(received.len(), 16);
    }

    #[tokio::test]
    async fn test_generator_stops_when_receivers_dropped() {
        let (tx, rx) = async_channel::bounded(2);
        drop(rx);
        assert_eq!(run_generator(tx).await, 0);
    }
}
