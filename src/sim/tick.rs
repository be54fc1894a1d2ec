//! Fixed timestep simulation tick
//!
//! Advances one level by exactly one step. Phase transitions:
//! `Idle → Playing → BallLost → Idle | GameOver`, `Playing → LevelCleared`.

use glam::Vec2;

use super::state::{GamePhase, GameState};

/// Input commands for a single tick (deterministic)
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Launch the ball (tap). Only acted on in `Idle`.
    pub launch: bool,
    /// Paddle horizontal velocity for this tick
    pub paddle_velocity: f32,
}

/// Advance the game state by one fixed timestep
pub fn tick(state: &mut GameState, input: &TickInput, dt: f32) {
    if state.phase.is_terminal() {
        return;
    }
    state.time_ticks += 1;

    if let Err(err) = state
        .world
        .bodies
        .set_velocity(state.paddle, Vec2::new(input.paddle_velocity, 0.0))
    {
        log::warn!("Paddle input dropped: {}", err);
    }

    match state.phase {
        GamePhase::Idle => {
            state.world.step_kinematic(dt);
            state.attach_balls();
            if input.launch {
                state.launch();
            }
        }

        GamePhase::Playing => {
            let contacts = state.world.step(dt);
            state.apply_contacts(&contacts);

            // A cleared level wins over a ball lost in the same step
            if state.bricks_remaining == 0 {
                state.phase = GamePhase::LevelCleared;
                log::info!("Level cleared, score {}", state.score);
            } else if state.remove_lost_balls() {
                state.phase = GamePhase::BallLost;
                log::info!("Ball lost at tick {}", state.time_ticks);
            }

            state.world.purge_dead();
        }

        GamePhase::BallLost => {
            state.world.step_kinematic(dt);
            state.lives = state.lives.saturating_sub(1);
            if state.lives == 0 {
                state.phase = GamePhase::GameOver;
                log::info!("Game over, final score {}", state.score);
                return;
            }
            match state.spawn_ball_attached() {
                Ok(ball) => {
                    state.phase = GamePhase::Idle;
                    log::info!("Respawned ball {}, {} lives left", ball, state.lives);
                }
                Err(err) => {
                    log::warn!("Ball respawn failed: {}", err);
                    state.phase = GamePhase::GameOver;
                }
            }
        }

        GamePhase::GameOver | GamePhase::LevelCleared => {}
    }
}
