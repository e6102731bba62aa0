use std::collections::VecDeque;

use tracing::{debug, info};

use crate::error::PlaybackError;
use crate::sources::Song;

/// Cola FIFO de canciones pendientes.
///
/// La canción activa nunca es miembro de la cola: vive en el controlador.
/// Sin prioridades ni dedup: URLs repetidas son entradas independientes.
#[derive(Debug)]
pub struct SongQueue {
    items: VecDeque<Song>,
    max_size: usize,
}

impl SongQueue {
    pub fn new(max_size: usize) -> Self {
        Self {
            items: VecDeque::new(),
            max_size,
        }
    }

    /// Agrega una canción al final de la cola.
    pub fn enqueue(&mut self, song: Song) -> Result<(), PlaybackError> {
        if self.items.len() >= self.max_size {
            return Err(PlaybackError::QueueFull(self.max_size));
        }

        info!("➕ Agregado a la cola: {}", song.title);
        self.items.push_back(song);
        Ok(())
    }

    /// Saca y devuelve la primera canción; nunca bloquea.
    pub fn dequeue_next(&mut self) -> Option<Song> {
        let next = self.items.pop_front();
        if let Some(ref song) = next {
            debug!("➡️ Siguiente en cola (FIFO): {}", song.title);
        }
        next
    }

    /// Instantánea de solo lectura, en orden de inserción.
    pub fn peek_all(&self) -> impl Iterator<Item = &Song> + '_ {
        self.items.iter()
    }

    /// Vacía la cola por completo.
    pub fn clear(&mut self) {
        if !self.items.is_empty() {
            info!("🗑️ Cola limpiada ({} canciones)", self.items.len());
        }
        self.items.clear();
    }

    #[allow(dead_code)]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sources::MediaHandle;
    use pretty_assertions::assert_eq;
    use url::Url;

    fn song(title: &str) -> Song {
        Song::new(
            title.to_string(),
            Url::parse("https://youtu.be/dQw4w9WgXcQ").unwrap(),
            MediaHandle::new(vec![0u8; 4]),
        )
    }

    fn titles(queue: &SongQueue) -> Vec<String> {
        queue.peek_all().map(|s| s.title.clone()).collect()
    }

    #[test]
    fn dequeues_in_insertion_order() {
        let mut queue = SongQueue::new(10);
        queue.enqueue(song("alpha")).unwrap();
        queue.enqueue(song("bravo")).unwrap();
        queue.enqueue(song("charlie")).unwrap();

        assert_eq!(queue.dequeue_next().unwrap().title, "alpha");
        assert_eq!(queue.dequeue_next().unwrap().title, "bravo");
        assert_eq!(queue.dequeue_next().unwrap().title, "charlie");
        assert!(queue.dequeue_next().is_none());
    }

    #[test]
    fn repeated_urls_are_independent_entries() {
        let mut queue = SongQueue::new(10);
        queue.enqueue(song("same")).unwrap();
        queue.enqueue(song("same")).unwrap();
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn peek_does_not_mutate() {
        let mut queue = SongQueue::new(10);
        queue.enqueue(song("alpha")).unwrap();
        queue.enqueue(song("bravo")).unwrap();

        assert_eq!(titles(&queue), vec!["alpha", "bravo"]);
        assert_eq!(titles(&queue), vec!["alpha", "bravo"]);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn rejects_when_full() {
        let mut queue = SongQueue::new(2);
        queue.enqueue(song("alpha")).unwrap();
        queue.enqueue(song("bravo")).unwrap();

        let err = queue.enqueue(song("charlie")).unwrap_err();
        assert!(matches!(err, PlaybackError::QueueFull(2)));
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn clear_empties_everything() {
        let mut queue = SongQueue::new(10);
        queue.enqueue(song("alpha")).unwrap();
        queue.enqueue(song("bravo")).unwrap();
        queue.clear();
        assert!(queue.is_empty());
        assert!(queue.dequeue_next().is_none());
    }
}
