//! Powerup Collection
//!
//! Pickups are single use: the powerup turns inactive in place and its
//! effect is written as an absolute expiry on every target.

use crate::game::collision::touched_powerups;
use crate::game::config::DebuffTarget;
use crate::game::events::GameEvent;
use crate::game::state::{GameState, GameTime, PlayerId, PowerupKind};

/// Players receiving the effect of `kind` collected by `collector`.
///
/// Speed and invincible always go to the collector. Slow and freeze follow
/// the configured [`DebuffTarget`].
pub fn effect_targets(state: &GameState, collector: PlayerId, kind: PowerupKind) -> Vec<PlayerId> {
    if !kind.is_debuff() || state.config.debuff_target == DebuffTarget::Collector {
        return vec![collector];
    }
    state
        .players
        .iter()
        .map(|p| p.id)
        .filter(|&id| id != collector)
        .collect()
}

/// Collect every active powerup touching the collector's current box.
///
/// Run after the collector's final position is committed. All touched
/// powerups are applied, in vector order.
pub fn collect_powerups(state: &mut GameState, collector: PlayerId, now: GameTime) -> Vec<GameEvent> {
    let Some(player) = state.player(collector) else {
        return Vec::new();
    };
    let bounds = player.bounds(&state.config);

    let mut events = Vec::new();
    for index in touched_powerups(state, &bounds) {
        let kind = state.powerups[index].kind;
        state.powerups[index].active = false;

        let expires_at = now.saturating_add(state.config.duration(kind));
        let targets = effect_targets(state, collector, kind);
        for &target in &targets {
            if let Some(idx) = state.player_index(target) {
                state.players[idx].effects.set_expiry(kind.effect(), expires_at);
            }
        }

        events.push(GameEvent::powerup_collected(now, collector, index, kind, targets, expires_at));
    }
    events
}
