//! Unit tests for netfilter-core.

#[test]
fn test_crate_structure() {
    // Smoke test - verifies the public surface hangs together
    use crate::{Dispatcher, ModuleArgs, NoItems, Phase, RequestContext, ResultCode};

    let args: Vec<String> = Vec::new();
    let _parsed = ModuleArgs::parse(&args).unwrap();
    let ctx = RequestContext::new(Phase::Chauthtok, 0, &args, &NoItems);
    assert_eq!(Dispatcher::new().dispatch(&ctx), ResultCode::Ignore);
}
