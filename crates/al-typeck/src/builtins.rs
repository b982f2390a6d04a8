//! Built-in function signatures.
//!
//! Built-ins are ordinary names in the global scope; user bindings may
//! shadow them. The compiler maps calls to these names onto dedicated
//! opcodes. The I/O built-ins return `T!String` so failures surface
//! through `or`.

use crate::env::TypeEnv;
use crate::ty::{Scheme, Ty};
use crate::unify::InferCtx;

/// Register every built-in scheme into the global scope.
pub fn register(env: &mut TypeEnv, ctx: &mut InferCtx) {
    // print: forall a. fn(a) None
    let a = ctx.fresh_key();
    env.insert(
        "print",
        Scheme {
            vars: vec![a],
            ty: Ty::function(vec![Ty::Var(a)], Ty::None, None),
        },
        false,
    );

    // to_string: forall a. fn(a) String
    let a = ctx.fresh_key();
    env.insert(
        "to_string",
        Scheme {
            vars: vec![a],
            ty: Ty::function(vec![Ty::Var(a)], Ty::string(), None),
        },
        false,
    );

    // len: forall a. fn([a]) Int
    let a = ctx.fresh_key();
    env.insert(
        "len",
        Scheme {
            vars: vec![a],
            ty: Ty::function(vec![Ty::array(Ty::Var(a))], Ty::int(), None),
        },
        false,
    );

    let mono = |env: &mut TypeEnv, name: &str, params: Vec<Ty>, ret: Ty, err: Option<Ty>| {
        env.insert(name, Scheme::mono(Ty::function(params, ret, err)), false);
    };

    mono(
        env,
        "str_concat",
        vec![Ty::string(), Ty::string()],
        Ty::string(),
        None,
    );
    mono(
        env,
        "str_split",
        vec![Ty::string(), Ty::string()],
        Ty::array(Ty::string()),
        None,
    );

    // File and network built-ins fail with a String message payload.
    mono(
        env,
        "file_read",
        vec![Ty::string()],
        Ty::string(),
        Some(Ty::string()),
    );
    mono(
        env,
        "file_write",
        vec![Ty::string(), Ty::string()],
        Ty::None,
        Some(Ty::string()),
    );
    mono(env, "tcp_listen", vec![Ty::int()], Ty::int(), Some(Ty::string()));
    mono(env, "tcp_accept", vec![Ty::int()], Ty::int(), Some(Ty::string()));
    mono(
        env,
        "tcp_read",
        vec![Ty::int()],
        Ty::string(),
        Some(Ty::string()),
    );
    mono(
        env,
        "tcp_write",
        vec![Ty::int(), Ty::string()],
        Ty::None,
        Some(Ty::string()),
    );
    mono(env, "tcp_close", vec![Ty::int()], Ty::None, Some(Ty::string()));
}
