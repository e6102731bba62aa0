use tracing::debug;

/// Compuerta exclusiva de arranque de reproducción.
///
/// Sin cola de espera: quien no la obtiene encola en lugar de bloquear.
/// Vive dentro del actor, así que un bool alcanza; la disciplina de
/// liberación está en el controlador, que la suelta en toda salida del
/// camino de arranque.
#[derive(Debug, Default)]
pub struct PlaybackGate {
    held: bool,
}

impl PlaybackGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intenta tomar la compuerta; `false` si ya está tomada.
    pub fn try_acquire(&mut self) -> bool {
        if self.held {
            return false;
        }
        self.held = true;
        debug!("🔒 Compuerta de reproducción tomada");
        true
    }

    /// Libera la compuerta; liberar sin tenerla es inofensivo.
    pub fn release(&mut self) {
        if self.held {
            debug!("🔓 Compuerta de reproducción liberada");
        }
        self.held = false;
    }

    pub fn is_held(&self) -> bool {
        self.held
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_fails_until_release() {
        let mut gate = PlaybackGate::new();
        assert!(gate.try_acquire());
        assert!(!gate.try_acquire());
        assert!(gate.is_held());

        gate.release();
        assert!(!gate.is_held());
        assert!(gate.try_acquire());
    }

    #[test]
    fn releasing_a_free_gate_is_harmless() {
        let mut gate = PlaybackGate::new();
        gate.release();
        assert!(!gate.is_held());
        assert!(gate.try_acquire());
    }
}
