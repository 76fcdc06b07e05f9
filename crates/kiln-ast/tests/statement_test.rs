//! Statement evaluation against a recording provider bundle

use std::sync::RwLock;

use kiln_ast::memory::{MemoryMethodPool, StoreTaskRegistry};
use kiln_ast::providers::{
    ClassInheritor, EventBus, FileIncluder, IncludePolicy, MethodPool, Notification, Providers,
    ScriptEngine, SignatureWriter, TaskRegistry,
};
use kiln_ast::{
    Assignment, Origin, Result, Statement, StatementGroup, StatementKind, ANONYMOUS_MARKER,
};
use kiln_data::{flags, vars, DataStore, Provenance, VarOp};

/// Records include/inherit requests; tasks and methods go to the shipped
/// in-memory implementations.
#[derive(Default)]
struct TestDriver {
    methods: MemoryMethodPool,
    tasks: StoreTaskRegistry,
    includes: RwLock<Vec<(String, IncludePolicy)>>,
    inherits: RwLock<Vec<String>>,
}

impl TestDriver {
    fn included(&self) -> Vec<(String, IncludePolicy)> {
        self.includes.read().unwrap().clone()
    }

    fn inherited(&self) -> Vec<String> {
        self.inherits.read().unwrap().clone()
    }
}

impl FileIncluder for TestDriver {
    fn include(
        &self,
        _from: &str,
        path: &str,
        _line: u32,
        _d: &mut DataStore,
        policy: IncludePolicy,
    ) -> Result<()> {
        self.includes
            .write()
            .unwrap()
            .push((path.to_string(), policy));
        Ok(())
    }
}

impl ClassInheritor for TestDriver {
    fn inherit(&self, classes: &str, _from: &str, _line: u32, _d: &mut DataStore) -> Result<()> {
        self.inherits.write().unwrap().push(classes.to_string());
        Ok(())
    }
}

impl EventBus for TestDriver {
    fn register(&self, _name: &str, _body: Option<&str>, _mask: &[String]) -> Result<()> {
        Ok(())
    }

    fn fire(&self, _event: Notification<'_>, _d: &mut DataStore) -> Result<()> {
        Ok(())
    }
}

impl ScriptEngine for TestDriver {
    fn execute(&self, _source: &str, _d: &mut DataStore) -> Result<()> {
        Ok(())
    }
}

impl MethodPool for TestDriver {
    fn insert_method(&self, name: &str, source: &str, file: &str) -> Result<()> {
        self.methods.insert_method(name, source, file)
    }
}

impl TaskRegistry for TestDriver {
    fn add_task(
        &self,
        task: &str,
        before: Option<&str>,
        after: Option<&str>,
        d: &mut DataStore,
    ) -> Result<()> {
        self.tasks.add_task(task, before, after, d)
    }

    fn delete_task(&self, task: &str, d: &mut DataStore) -> Result<()> {
        self.tasks.delete_task(task, d)
    }

    fn materialize(&self, tasks: &[String], deleted: &[String], d: &mut DataStore) -> Result<()> {
        self.tasks.materialize(tasks, deleted, d)
    }
}

impl SignatureWriter for TestDriver {
    fn finalize(&self, _file: &str, _d: &mut DataStore, _variant: Option<&str>) -> Result<()> {
        Ok(())
    }
}

fn origin(line: u32) -> Origin {
    Origin::new("recipe.kn", line)
}

fn eval(d: &mut DataStore, driver: &TestDriver, statement: Statement) {
    let providers = Providers::from_driver(driver);
    statement.eval(d, &providers).unwrap();
}

#[test]
fn named_function_stores_body_and_flag() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::Function {
                name: "do_compile".to_string(),
                body: vec!["    make".to_string(), "    make install".to_string()],
            },
        ),
    );

    assert_eq!(d.get_var("do_compile"), Some("    make\n    make install"));
    assert_eq!(d.get_flag("do_compile", flags::FUNC), Some("1"));
    assert!(!driver.methods.contains("do_compile"));
}

#[test]
fn anonymous_function_is_deferred_under_synthesized_name() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(7),
            StatementKind::Function {
                name: ANONYMOUS_MARKER.to_string(),
                body: vec!["    d.setVar('A', '1')".to_string()],
            },
        ),
    );

    let func = "__anon_7_recipe_kn";
    assert_eq!(d.get_var(vars::DEFERRED_FUNCS), Some(func));
    let registered = driver.methods.get(func).unwrap();
    assert_eq!(
        registered.source,
        "def __anon_7_recipe_kn(d):\n    d.setVar('A', '1')"
    );
    assert_eq!(registered.file, "recipe.kn");
    assert_eq!(d.get_var(func), Some(registered.source.as_str()));
}

#[test]
fn anonymous_functions_accumulate_in_order() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    for line in [3, 9] {
        eval(
            &mut d,
            &driver,
            Statement::new(
                origin(line),
                StatementKind::Function {
                    name: ANONYMOUS_MARKER.to_string(),
                    body: vec!["    pass".to_string()],
                },
            ),
        );
    }

    assert_eq!(
        d.get_var(vars::DEFERRED_FUNCS),
        Some("__anon_3_recipe_kn __anon_9_recipe_kn")
    );
    assert_eq!(driver.methods.len(), 2);
}

#[test]
fn script_function_registers_whole_module() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::ScriptFunction {
                name: "get_depends".to_string(),
                module: "recipe_utils".to_string(),
                body: vec!["def get_depends(d):".to_string(), "    return 'x'".to_string()],
            },
        ),
    );

    assert_eq!(d.get_flag("get_depends", flags::FUNC), Some("1"));
    assert_eq!(d.get_flag("get_depends", flags::SCRIPTED), Some("1"));
    assert_eq!(
        d.get_var("get_depends"),
        Some("def get_depends(d):\n    return 'x'")
    );
    assert!(driver.methods.contains("recipe_utils"));
}

#[test]
fn function_flags_overwrite_previous_markers() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::FunctionFlags {
                name: "do_patch".to_string(),
                scripted: true,
                privileged: true,
            },
        ),
    );
    assert_eq!(d.get_flag("do_patch", flags::SCRIPTED), Some("1"));
    assert_eq!(d.get_flag("do_patch", flags::PRIVILEGED), Some("1"));

    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(2),
            StatementKind::FunctionFlags {
                name: "do_patch".to_string(),
                scripted: true,
                privileged: false,
            },
        ),
    );
    assert_eq!(d.get_flag("do_patch", flags::SCRIPTED), Some("1"));
    assert_eq!(d.get_flag("do_patch", flags::PRIVILEGED), None);
}

#[test]
fn export_functions_generates_scripted_wrapper() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    d.set_var("base_do_build", "    build it", Provenance::internal());
    d.set_flag("base_do_build", flags::SCRIPTED, "1", Provenance::internal());
    d.set_flag("base_do_build", flags::FUNC, "1", Provenance::internal());

    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::ExportFunctions {
                class: "base".to_string(),
                functions: "do_build".to_string(),
            },
        ),
    );

    assert_eq!(d.get_var("do_build"), Some("    exec_func('base_do_build', d)\n"));
    assert_eq!(d.get_flag("do_build", flags::WRAPPER), Some("1"));
    assert_eq!(d.get_flag("do_build", flags::FUNC), Some("1"));
    assert_eq!(d.get_flag("do_build", flags::SCRIPTED), Some("1"));
}

#[test]
fn export_functions_generates_shell_wrapper() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    d.set_var("base_do_install", "    install it", Provenance::internal());

    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::ExportFunctions {
                class: "base".to_string(),
                functions: "do_install".to_string(),
            },
        ),
    );

    assert_eq!(d.get_var("do_install"), Some("    base_do_install\n"));
    assert_eq!(d.get_flag("do_install", flags::SCRIPTED), None);
}

#[test]
fn export_functions_never_clobbers_user_function() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    d.set_var("do_build", "    my own build", Provenance::internal());

    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::ExportFunctions {
                class: "base".to_string(),
                functions: "do_build".to_string(),
            },
        ),
    );

    assert_eq!(d.get_var("do_build"), Some("    my own build"));
    assert_eq!(d.get_flag("do_build", flags::WRAPPER), None);
}

#[test]
fn export_functions_regenerates_its_own_wrapper() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    d.set_var("base_do_build", "    build it", Provenance::internal());

    let export = |d: &mut DataStore| {
        eval(
            d,
            &driver,
            Statement::new(
                origin(1),
                StatementKind::ExportFunctions {
                    class: "base".to_string(),
                    functions: "do_build".to_string(),
                },
            ),
        );
    };
    export(&mut d);
    // the private side turns scripted between the two export passes
    d.set_flag("base_do_build", flags::SCRIPTED, "1", Provenance::internal());
    export(&mut d);

    assert_eq!(d.get_var("do_build"), Some("    exec_func('base_do_build', d)\n"));
    assert_eq!(d.get_flag("do_build", flags::WRAPPER), Some("1"));
}

#[test]
fn export_functions_propagates_dirs_both_ways() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    d.set_var("base_do_build", "    build", Provenance::internal());
    d.set_flag("base_do_build", flags::DIRS, "${B}", Provenance::internal());
    d.set_var("base_do_install", "    install", Provenance::internal());
    d.set_flag("do_install", flags::DIRS, "${D}", Provenance::internal());

    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::ExportFunctions {
                class: "base".to_string(),
                functions: "do_build do_install".to_string(),
            },
        ),
    );

    assert_eq!(d.get_flag("do_build", flags::DIRS), Some("${B}"));
    assert_eq!(d.get_flag("base_do_install", flags::DIRS), Some("${D}"));
}

#[test]
fn add_handlers_appends_names_and_flags_them() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::AddHandlers {
                handlers: "on_parse on_build".to_string(),
            },
        ),
    );
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(2),
            StatementKind::AddHandlers {
                handlers: "on_parse".to_string(),
            },
        ),
    );

    // registration keeps duplicates; the flag is idempotent
    assert_eq!(d.get_var(vars::EVENT_HANDLERS), Some("on_parse on_build on_parse"));
    assert_eq!(d.get_flag("on_parse", flags::HANDLER), Some("1"));
    assert_eq!(d.get_flag("on_build", flags::HANDLER), Some("1"));
}

#[test]
fn add_task_reaches_the_registry() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::AddTask {
                task: "do_build".to_string(),
                before: Some("do_install".to_string()),
                after: Some("do_fetch".to_string()),
            },
        ),
    );
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(2),
            StatementKind::DeleteTask {
                task: "do_fetch".to_string(),
            },
        ),
    );

    assert_eq!(d.get_var(vars::TASKS), Some("do_build"));
    assert_eq!(d.get_flag("do_build", flags::BEFORE), Some("do_install"));
    assert_eq!(d.get_flag("do_build", flags::AFTER), Some("do_fetch"));
    assert_eq!(d.get_var(vars::DELETED_TASKS), Some("do_fetch"));
}

#[test]
fn include_expands_target_before_delegating() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    d.set_var("LAYER", "conf", Provenance::internal());

    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::Include {
                target: "${LAYER}/site.kn".to_string(),
                required: true,
            },
        ),
    );
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(2),
            StatementKind::Include {
                target: "local.kn".to_string(),
                required: false,
            },
        ),
    );

    assert_eq!(
        driver.included(),
        vec![
            ("conf/site.kn".to_string(), IncludePolicy::Required),
            ("local.kn".to_string(), IncludePolicy::Optional),
        ]
    );
}

#[test]
fn export_statement_only_touches_the_flag() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::Export {
                var: "CFLAGS".to_string(),
            },
        ),
    );

    assert_eq!(d.get_flag("CFLAGS", flags::EXPORT), Some("1"));
    assert_eq!(d.get_var("CFLAGS"), None);
}

#[test]
fn inherit_delegates_the_raw_class_list() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    eval(
        &mut d,
        &driver,
        Statement::new(
            origin(1),
            StatementKind::Inherit {
                classes: "base multilib".to_string(),
            },
        ),
    );

    assert_eq!(driver.inherited(), vec!["base multilib".to_string()]);
}

#[test]
fn group_eval_preserves_statement_order() {
    let mut d = DataStore::new();
    let driver = TestDriver::default();
    let providers = Providers::from_driver(&driver);

    let mut group = StatementGroup::new();
    group.push_assignment(origin(1), Assignment::new("A", "1"));
    group.push_assignment(
        origin(2),
        Assignment {
            append: true,
            ..Assignment::new("A", "2")
        },
    );
    group.push_assignment(
        origin(3),
        Assignment {
            conditional: true,
            ..Assignment::new("A", "3")
        },
    );
    group.eval(&mut d, &providers).unwrap();

    assert_eq!(d.get_var("A"), Some("1 2"));
    assert_eq!(d.history("A").last().map(|p| p.op), Some(VarOp::SetIfUnset));
}
