mod common;

use common::{no_mirror, FakeEgl, FakeGl};
use egl_mirror::{create_context, Config, ContextType, State};

fn factory(egl: &FakeEgl, gl: &FakeGl) -> impl FnMut() -> anyhow::Result<(FakeEgl, FakeGl)> {
    let egl = egl.clone();
    let gl = gl.clone();
    move || Ok((egl.clone(), gl.clone()))
}

#[test]
fn gles3_succeeds_first_try() {
    let egl = FakeEgl::default();
    let gl = FakeGl::default();

    let ctx = create_context(factory(&egl, &gl), &no_mirror(), 32, 32).unwrap();

    assert_eq!(ctx.context_type(), ContextType::Gles3Compatible);
    assert_eq!(ctx.state(), State::Initialized);
    assert_eq!(egl.state.borrow().requested_versions, vec![(3, 3)]);
}

#[test]
fn context_creation_failure_downgrades_to_gles2() {
    let egl = FakeEgl::default();
    egl.state.borrow_mut().fail_versions = vec![(3, 3)];
    let gl = FakeGl::default();

    let ctx = create_context(factory(&egl, &gl), &no_mirror(), 32, 32).unwrap();

    assert_eq!(ctx.context_type(), ContextType::Gles2Compatible);
    assert_eq!(ctx.get_window_width(), 32);
    let state = egl.state.borrow();
    assert_eq!(state.requested_versions, vec![(3, 3), (2, 0)]);
    assert_eq!(state.terminated, 1);
}

#[test]
fn unviable_driver_downgrades_to_gles2() {
    let egl = FakeEgl::default();
    let gl = FakeGl::with_version(Some((2, 1)));

    let ctx = create_context(factory(&egl, &gl), &no_mirror(), 32, 32).unwrap();

    assert_eq!(ctx.context_type(), ContextType::Gles2Compatible);
    assert!(ctx.is_viable());
    // The rejected GLES3 attempt was fully torn down.
    let state = egl.state.borrow();
    assert_eq!(state.terminated, 1);
    assert_eq!(state.contexts.len(), 1);
    assert_eq!(state.surfaces.len(), 1);
}

#[test]
fn no_fallback_fails_immediately() {
    let egl = FakeEgl::default();
    egl.state.borrow_mut().fail_versions = vec![(3, 3)];
    let gl = FakeGl::default();
    let config = Config {
        fallback_to_gles2: false,
        ..no_mirror()
    };

    let err = create_context(factory(&egl, &gl), &config, 32, 32).err().unwrap();

    assert!(format!("{:#}", err).contains("does not support"));
    assert_eq!(egl.state.borrow().requested_versions, vec![(3, 3)]);
}

#[test]
fn exhausted_ladder_is_fatal() {
    let egl = FakeEgl::default();
    let gl = FakeGl::with_version(None);

    let err = create_context(factory(&egl, &gl), &no_mirror(), 32, 32).err().unwrap();

    let message = format!("{:#}", err);
    assert!(message.contains("does not support any of the supported OpenGL versions"));
    let state = egl.state.borrow();
    assert_eq!(state.requested_versions, vec![(3, 3), (2, 0)]);
    assert_eq!(state.terminated, 2);
    assert!(state.contexts.is_empty());
}

#[test]
fn configured_vsync_is_applied_after_creation() {
    let egl = FakeEgl::default();
    let gl = FakeGl::default();
    let config = Config {
        vsync: true,
        ..no_mirror()
    };

    let ctx = create_context(factory(&egl, &gl), &config, 32, 32).unwrap();

    assert!(ctx.is_using_vsync());
    assert_eq!(egl.state.borrow().swap_interval, Some(1));
}

#[test]
fn factory_errors_propagate() {
    let result = create_context(
        || -> anyhow::Result<(FakeEgl, FakeGl)> { anyhow::bail!("Failed to load EGL") },
        &no_mirror(),
        32,
        32,
    );
    let message = format!("{:#}", result.err().unwrap());
    assert!(message.contains("does not support any of the supported OpenGL versions"));
    assert!(message.contains("Failed to load EGL"));
}
