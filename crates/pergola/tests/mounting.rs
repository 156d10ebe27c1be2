//! Mount semantics: idempotence, collision policy, setup ordering,
//! root remapping, and bulk mounting.

use std::sync::{Arc, Mutex};

use http::{Method, StatusCode};
use pergola::{App, Blueprint, Controller, Env, Response};

fn forum() -> Blueprint {
    Blueprint::new("Forum")
        .root("/forum")
        .get("topics", |_env| Response::ok("topics"))
        .post("topics", |_env| Response::ok("created"))
}

#[test]
fn mounting_the_same_identity_twice_is_a_noop() {
    let once = App::builder().mount(forum()).finalize();
    let twice = App::builder().mount(forum()).mount(forum()).finalize();

    assert_eq!(once.route_count(), twice.route_count());

    let mut env = Env::get("/forum/topics");
    assert_eq!(twice.call(&mut env).status, StatusCode::OK);
}

#[test]
fn colliding_patterns_last_mount_wins() {
    // Two different controllers compile the identical pattern; the
    // later mount replaces the whole method map, so the first
    // controller's POST disappears along with its GET.
    let first = Blueprint::new("First")
        .root("/shared")
        .get("page", |_env| Response::ok("first"))
        .post("page", |_env| Response::ok("first-post"));
    let second = Blueprint::new("Second")
        .root("/shared")
        .get("page", |_env| Response::ok("second"));

    let app = App::builder().mount(first).mount(second).finalize();

    let mut env = Env::get("/shared/page");
    assert_eq!(app.call(&mut env).body_string(), "second");

    let mut env = Env::new(Method::POST, "/shared/page");
    let resp = app.call(&mut env);
    assert_eq!(resp.status, StatusCode::NOT_IMPLEMENTED);
    assert!(resp.body_string().contains("GET"));
}

#[test]
fn per_mount_setup_runs_before_global_setup() {
    let order = Arc::new(Mutex::new(Vec::new()));

    let for_global = Arc::clone(&order);
    let for_mount = Arc::clone(&order);

    let app = App::builder()
        .setup(move |_config| {
            if let Ok(mut order) = for_global.lock() {
                order.push("global");
            }
        })
        .mount_with(forum(), &["/forum"], move |_config| {
            if let Ok(mut order) = for_mount.lock() {
                order.push("per-mount");
            }
        })
        .finalize();

    assert_eq!(
        order.lock().map(|o| o.clone()).unwrap_or_default(),
        vec!["per-mount", "global"]
    );

    let mut env = Env::get("/forum/topics");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);
}

#[test]
fn global_setup_only_affects_later_mounts() {
    fn api(name: &str, root: &str) -> Blueprint {
        Blueprint::new(name).root(root).get("item", |env| {
            Response::ok(format!("format={:?}", env.format))
        })
    }

    let app = App::builder()
        .mount(api("Early", "/early"))
        .setup(|config| {
            config.formats = Some(vec![".json".to_string()]);
        })
        .mount(api("Late", "/late"))
        .finalize();

    // Mounted before the global setup: no format splitter.
    let mut env = Env::get("/early/item/1.json");
    assert_eq!(app.call(&mut env).body_string(), "format=None");

    // Mounted after: the splitter applies.
    let mut env = Env::get("/late/item/1.json");
    assert_eq!(
        app.call(&mut env).body_string(),
        "format=Some(\".json\")"
    );
}

#[test]
fn setup_can_add_controller_middleware() {
    let app = App::builder()
        .mount_with(forum(), &["/forum"], |config| {
            config.middleware.push(pergola::middleware(|inner| {
                pergola::handler(move |env| inner(env).with_header("X-Setup", "applied"))
            }));
        })
        .finalize();

    let mut env = Env::get("/forum/topics");
    assert_eq!(app.call(&mut env).header("X-Setup"), Some("applied"));
}

#[test]
fn mount_at_remaps_the_primary_root() {
    let app = App::builder().mount_at(forum(), &["/community"]).finalize();

    let mut env = Env::get("/community/topics");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);

    // The declared root is gone after remapping.
    let mut env = Env::get("/forum/topics");
    assert_eq!(app.call(&mut env).status, StatusCode::NOT_FOUND);
}

#[test]
fn extra_roots_become_alternate_canonicals() {
    let ctrl = Blueprint::new("Canonicals")
        .get("some-url", |_env| Response::ok("ok"));
    let app = App::builder()
        .mount_at(ctrl, &["/", "/app-canonical"])
        .finalize();

    let mut env = Env::get("/some-url");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);

    let mut env = Env::get("/app-canonical/some-url");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);
}

#[test]
fn builder_base_composes_with_supplied_roots() {
    let inner = pergola::AppBuilder::at("/api")
        .mount_at(forum(), &["/forum"])
        .finalize();

    let mut env = Env::get("/api/forum/topics");
    assert_eq!(inner.call(&mut env).status, StatusCode::OK);
}

#[test]
fn controller_rewrite_rules_are_carried_in_mount_order() {
    let first = Blueprint::new("First")
        .root("/first")
        .get("index", |_env| Response::ok("first"))
        .rewrite("^/moved$", pergola::rewrite_fn(|_caps, _env| {
            Response::text(StatusCode::GONE, "from-first")
        }))
        .expect("valid pattern");
    let second = Blueprint::new("Second")
        .root("/second")
        .get("index", |_env| Response::ok("second"))
        .rewrite("^/moved$", pergola::rewrite_fn(|_caps, _env| {
            Response::text(StatusCode::GONE, "from-second")
        }))
        .expect("valid pattern");

    let app = App::builder().mount(first).mount(second).finalize();

    // The first-mounted controller's rule wins the tie.
    let mut env = Env::get("/moved");
    assert_eq!(app.call(&mut env).body_string(), "from-first");
}

#[test]
fn mount_all_mounts_a_collection() {
    let controllers: Vec<Box<dyn Controller>> = vec![
        Box::new(forum()),
        Box::new(
            Blueprint::new("Blog")
                .root("/blog")
                .get("posts", |_env| Response::ok("posts")),
        ),
    ];

    let app = App::builder().mount_all(controllers, &[]).finalize();

    let mut env = Env::get("/forum/topics");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);
    let mut env = Env::get("/blog/posts");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);
}

#[test]
fn mount_matching_filters_by_identity() {
    fn named(name: &str, root: &str) -> Box<dyn Controller> {
        Box::new(
            Blueprint::new(name)
                .root(root)
                .get("index", |_env| Response::ok("ok")),
        )
    }

    let controllers = vec![
        named("AdminUsers", "/admin/users"),
        named("AdminAudit", "/admin/audit"),
        named("PublicHome", "/home"),
    ];

    let app = App::builder()
        .mount_matching(controllers, "^Admin", &[])
        .expect("valid name pattern")
        .finalize();

    let mut env = Env::get("/admin/users");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);
    let mut env = Env::get("/admin/audit");
    assert_eq!(app.call(&mut env).status, StatusCode::OK);
    let mut env = Env::get("/home");
    assert_eq!(app.call(&mut env).status, StatusCode::NOT_FOUND);
}
