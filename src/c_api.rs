use std::ffi::{CStr, c_char};

use crate::{
    body::{BodyId, BodySnapshot},
    collision::Bounds,
    config::WorldConfig,
    stats::FrameStats,
    world::SimulationWorld,
};

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Create() -> *mut SimulationWorld {
    Box::into_raw(Box::new(SimulationWorld::default()))
}

/// Creates a world from a JSON config. Returns null if the config is invalid.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_CreateWithConfig(json: *const c_char) -> *mut SimulationWorld {
    if json.is_null() {
        return std::ptr::null_mut();
    }
    let json = unsafe { CStr::from_ptr(json) };
    let Ok(json) = json.to_str() else {
        return std::ptr::null_mut();
    };
    match WorldConfig::from_json(json) {
        Ok(config) => Box::into_raw(Box::new(SimulationWorld::new(config))),
        Err(err) => {
            tracing::warn!(%err, "rejected world config");
            std::ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Destroy(handle: *mut SimulationWorld) {
    if !handle.is_null() {
        unsafe { drop(Box::from_raw(handle)) };
    }
}

/// Advances one frame inside a viewport of `width` x `height` at the origin.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_Advance(handle: *mut SimulationWorld, dt: f64, width: f64, height: f64) -> bool {
    unsafe { handle.as_mut() }.is_some_and(|world| world.advance(dt, Bounds::viewport(width, height)))
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_SetTargetCount(handle: *mut SimulationWorld, n: usize) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.set_target_count(n);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_SetGravity(handle: *mut SimulationWorld, gravity: f64) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.set_gravity(gravity);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_SetMicrostep(handle: *mut SimulationWorld, microstep: f64) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.set_microstep(microstep);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_SetSlowMotion(handle: *mut SimulationWorld, slow: bool) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.set_slow_motion(slow);
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_SetPaused(handle: *mut SimulationWorld, paused: bool) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.set_paused(paused);
    }
}

/// Returns false if no live body has `id`.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_SetDragTarget(handle: *mut SimulationWorld, id: u32, x: f64, y: f64) -> bool {
    unsafe { handle.as_mut() }.is_some_and(|world| world.set_drag_target(BodyId(id), x, y).is_ok())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_ClearDragTarget(handle: *mut SimulationWorld) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.clear_drag_target();
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_GetBodyCount(handle: *const SimulationWorld) -> usize {
    unsafe { handle.as_ref() }.map_or(0, |world| world.snapshots().len())
}

/// Pointer to `World_GetBodyCount` snapshots, valid until the next mutating call.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_GetSnapshots(handle: *const SimulationWorld) -> *const BodySnapshot {
    unsafe { handle.as_ref() }.map_or(std::ptr::null(), |world| world.snapshots().as_ptr())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_GetStats(handle: *const SimulationWorld) -> FrameStats {
    unsafe { handle.as_ref() }.map_or_else(FrameStats::default, |world| *world.stats())
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn World_EnableTiming(handle: *mut SimulationWorld, enabled: bool) {
    if let Some(world) = unsafe { handle.as_mut() } {
        world.enable_timing(enabled);
    }
}
