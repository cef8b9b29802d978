use lazy_static::lazy_static;
use semver::Version;
use slog::{o, Logger};
use solvent::{
    BoundVersion, Container, ContainerCache, ContainerProvider, ErrorKind, Requirement, Resolver,
};
use std::{collections::HashMap, sync::Arc};

lazy_static! {
    // I don't wanna see no logging output!
    static ref LOGGER: Logger = Logger::root(slog::Discard, o!());
}

macro_rules! ver {
    ($s:expr) => {
        Version::parse($s).unwrap()
    };
}

macro_rules! range {
    ($lo:expr, $hi:expr) => {
        Requirement::range(ver!($lo), ver!($hi))
    };
}

struct InMemory {
    containers: HashMap<&'static str, Container<&'static str>>,
}

impl ContainerProvider<&'static str> for InMemory {
    fn fetch(
        &self,
        id: &&'static str,
        _skip_update: bool,
    ) -> Result<Container<&'static str>, ErrorKind> {
        self.containers
            .get(id)
            .cloned()
            .ok_or(ErrorKind::PackageNotFound)
    }
}

fn pkg(
    id: &'static str,
    releases: Vec<(&str, Vec<(&'static str, Requirement)>)>,
) -> Container<&'static str> {
    Container::new(
        id,
        releases
            .into_iter()
            .map(|(v, deps)| (ver!(v), deps))
            .collect(),
    )
}

fn cache(containers: Vec<Container<&'static str>>) -> Arc<ContainerCache<&'static str>> {
    let containers = containers.into_iter().map(|c| (*c.id(), c)).collect();
    Arc::new(ContainerCache::new(
        &LOGGER,
        Box::new(InMemory { containers }),
    ))
}

fn solve(
    root: &'static str,
    containers: Vec<Container<&'static str>>,
) -> solvent::Res<Vec<(&'static str, BoundVersion)>> {
    solve_pinned(root, containers, vec![])
}

fn solve_pinned(
    root: &'static str,
    containers: Vec<Container<&'static str>>,
    pins: Vec<(&'static str, Requirement)>,
) -> solvent::Res<Vec<(&'static str, BoundVersion)>> {
    let cache = cache(containers);
    Resolver::new(&LOGGER, &cache, root, pins).solve()
}

fn bound<'a>(res: &'a [(&'static str, BoundVersion)], pkg: &str) -> &'a BoundVersion {
    res.iter()
        .find(|(p, _)| *p == pkg)
        .map(|(_, b)| b)
        .unwrap_or_else(|| panic!("no binding for {}", pkg))
}

#[test]
fn resolve_trivial_root() {
    let res = solve("app", vec![pkg("app", vec![("1.0.0", vec![])])]).unwrap();
    assert_eq!(res, vec![("app", BoundVersion::Version(ver!("1.0.0")))]);
}

#[test]
fn resolve_linear_chain_prefers_newest() {
    let res = solve(
        "app",
        vec![
            pkg("app", vec![("1.0.0", vec![("b", range!("1.0.0", "2.0.0"))])]),
            pkg(
                "b",
                vec![("1.2.0", vec![]), ("1.1.0", vec![]), ("1.0.0", vec![])],
            ),
        ],
    )
    .unwrap();

    assert_eq!(res.len(), 2);
    assert_eq!(bound(&res, "app"), &BoundVersion::Version(ver!("1.0.0")));
    assert_eq!(bound(&res, "b"), &BoundVersion::Version(ver!("1.2.0")));
}

#[test]
fn resolve_backjump() {
    let res = solve(
        "app",
        vec![
            pkg(
                "app",
                vec![(
                    "1.0.0",
                    vec![
                        ("b", range!("1.0.0", "2.0.0")),
                        ("c", range!("1.0.0", "2.0.0")),
                    ],
                )],
            ),
            pkg(
                "b",
                vec![
                    ("1.1.0", vec![("c", range!("2.0.0", "3.0.0"))]),
                    ("1.0.0", vec![("c", range!("1.0.0", "2.0.0"))]),
                ],
            ),
            pkg("c", vec![("2.0.0", vec![]), ("1.0.0", vec![])]),
        ],
    )
    .unwrap();

    // b 1.1.0 pulls c out of app's range, so the solver has to fall back to
    // b 1.0.0.
    assert_eq!(res.len(), 3);
    assert_eq!(bound(&res, "b"), &BoundVersion::Version(ver!("1.0.0")));
    assert_eq!(bound(&res, "c"), &BoundVersion::Version(ver!("1.0.0")));
}

#[test]
fn resolve_no_matching_version() {
    let res = solve(
        "app",
        vec![
            pkg("app", vec![("1.0.0", vec![("b", range!("3.0.0", "4.0.0"))])]),
            pkg("b", vec![("2.0.0", vec![]), ("1.0.0", vec![])]),
        ],
    );

    let msg = res.unwrap_err().to_string();
    assert!(msg.contains("version solving has failed"), "{}", msg);
    assert!(msg.contains("unavailable"), "{}", msg);
}

#[test]
fn resolve_direct_conflict() {
    let res = solve(
        "app",
        vec![
            pkg(
                "app",
                vec![(
                    "1.0.0",
                    vec![
                        ("b", range!("1.0.0", "2.0.0")),
                        ("b", range!("2.0.0", "3.0.0")),
                    ],
                )],
            ),
            pkg("b", vec![("2.0.0", vec![]), ("1.0.0", vec![])]),
        ],
    );

    let msg = res.unwrap_err().to_string();
    assert!(msg.contains("version solving has failed"), "{}", msg);
    assert!(msg.contains("depends on"), "{}", msg);
}

#[test]
fn resolve_diamond_decides_shared_dep_once() {
    let res = solve(
        "app",
        vec![
            pkg(
                "app",
                vec![(
                    "1.0.0",
                    vec![("x", Requirement::any()), ("y", Requirement::any())],
                )],
            ),
            pkg("x", vec![("1.0.0", vec![("z", range!("1.0.0", "2.0.0"))])]),
            pkg("y", vec![("1.0.0", vec![("z", range!("1.0.0", "2.0.0"))])]),
            pkg("z", vec![("1.0.0", vec![])]),
        ],
    )
    .unwrap();

    assert_eq!(res.len(), 4);
    assert_eq!(bound(&res, "z"), &BoundVersion::Version(ver!("1.0.0")));
    assert_eq!(res.iter().filter(|(p, _)| *p == "z").count(), 1);
}

#[test]
fn resolve_prefers_pinned_version() {
    let universe = || {
        vec![
            pkg("app", vec![("1.0.0", vec![("b", range!("1.0.0", "2.0.0"))])]),
            pkg(
                "b",
                vec![("1.2.0", vec![]), ("1.1.0", vec![]), ("1.0.0", vec![])],
            ),
        ]
    };

    let res = solve_pinned(
        "app",
        universe(),
        vec![("b", Requirement::exact(ver!("1.1.0")))],
    )
    .unwrap();
    assert_eq!(bound(&res, "b"), &BoundVersion::Version(ver!("1.1.0")));

    // A pin that no longer satisfies the constraints is ignored.
    let res = solve_pinned(
        "app",
        universe(),
        vec![("b", Requirement::exact(ver!("9.9.9")))],
    )
    .unwrap();
    assert_eq!(bound(&res, "b"), &BoundVersion::Version(ver!("1.2.0")));
}

#[test]
fn resolve_from_constraints() {
    let cache = cache(vec![
        pkg("app", vec![("1.0.0", vec![])]),
        pkg(
            "b",
            vec![("1.2.0", vec![]), ("1.1.0", vec![]), ("1.0.0", vec![])],
        ),
    ]);

    let resolver = Resolver::from_constraints(
        &LOGGER,
        &cache,
        vec![
            ("app", Requirement::any()),
            ("b", range!("1.0.0", "1.2.0")),
        ],
        vec![],
    )
    .unwrap();
    let res = resolver.solve().unwrap();

    assert_eq!(bound(&res, "app"), &BoundVersion::Version(ver!("1.0.0")));
    assert_eq!(bound(&res, "b"), &BoundVersion::Version(ver!("1.1.0")));
}

#[test]
fn resolve_revision_dependency() {
    let res = solve(
        "app",
        vec![
            pkg(
                "app",
                vec![(
                    "1.0.0",
                    vec![("lib", Requirement::Revision("deadbeef".to_string()))],
                )],
            ),
            pkg("lib", vec![]).with_revision("deadbeef", vec![]),
        ],
    )
    .unwrap();

    assert_eq!(
        bound(&res, "lib"),
        &BoundVersion::Revision("deadbeef".to_string())
    );
}

#[test]
fn resolve_unversioned_dependency() {
    let res = solve(
        "app",
        vec![
            pkg(
                "app",
                vec![("1.0.0", vec![("local", Requirement::Unversioned)])],
            ),
            pkg("local", vec![]),
        ],
    )
    .unwrap();

    assert_eq!(bound(&res, "local"), &BoundVersion::Unversioned);
}

#[test]
fn fetch_errors_abort_the_solve() {
    let res = solve(
        "app",
        vec![pkg(
            "app",
            vec![("1.0.0", vec![("ghost", Requirement::any())])],
        )],
    );

    let err = res.unwrap_err();
    assert_eq!(
        err.downcast_ref::<ErrorKind>(),
        Some(&ErrorKind::PackageNotFound)
    );
}

#[test]
fn cancellation_is_observed() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let cache = cache(vec![pkg("app", vec![("1.0.0", vec![])])]);
    let flag = Arc::new(AtomicBool::new(true));
    flag.store(true, Ordering::SeqCst);

    let res = Resolver::new(&LOGGER, &cache, "app", vec![])
        .with_cancellation(Arc::clone(&flag))
        .solve();

    let err = res.unwrap_err();
    assert_eq!(
        err.downcast_ref::<ErrorKind>(),
        Some(&ErrorKind::Cancelled)
    );
}

#[test]
fn delegate_observes_progress() {
    use solvent::{Delegate, Term};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl Delegate<&'static str> for Recorder {
        fn fetching(&self, pkg: &&'static str) {
            self.events.lock().unwrap().push(format!("fetch {}", pkg));
        }
        fn decided(&self, term: &Term<&'static str>) {
            self.events.lock().unwrap().push(format!("decide {}", term));
        }
    }

    let cache = cache(vec![
        pkg("app", vec![("1.0.0", vec![("b", range!("1.0.0", "2.0.0"))])]),
        pkg("b", vec![("1.2.0", vec![])]),
    ]);
    let recorder = Recorder::default();

    Resolver::new(&LOGGER, &cache, "app", vec![])
        .with_delegate(&recorder)
        .solve()
        .unwrap();

    let events = recorder.events.lock().unwrap();
    assert!(events.contains(&"fetch b".to_string()));
    assert!(events.contains(&"decide app 1.0.0".to_string()));
    assert!(events.contains(&"decide b 1.2.0".to_string()));
}

#[test]
fn solution_satisfies_all_declared_constraints() {
    let res = solve(
        "app",
        vec![
            pkg(
                "app",
                vec![(
                    "1.0.0",
                    vec![
                        ("b", range!("1.0.0", "2.0.0")),
                        ("c", range!("1.0.0", "3.0.0")),
                    ],
                )],
            ),
            pkg(
                "b",
                vec![
                    ("1.5.0", vec![("c", range!("2.0.0", "3.0.0"))]),
                    ("1.0.0", vec![]),
                ],
            ),
            pkg("c", vec![("2.5.0", vec![]), ("1.0.0", vec![])]),
        ],
    )
    .unwrap();

    // b 1.5.0 and c 2.5.0 are mutually consistent here, so the newest of
    // each wins and every constraint holds.
    assert_eq!(bound(&res, "b"), &BoundVersion::Version(ver!("1.5.0")));
    assert_eq!(bound(&res, "c"), &BoundVersion::Version(ver!("2.5.0")));
}
