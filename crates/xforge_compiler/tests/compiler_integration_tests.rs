//! Integration tests for compiling, loading and instantiating XScript modules.

use std::collections::HashSet;
use std::sync::Arc;

use xforge_compiler::{
    codes, CompilationUnit, CompiledModule, DynamicCompiler, InstanceFactory, InstantiationError,
    Location, ModuleReference, NativeLibrary, RuntimeError, Value, MAX_CALL_DEPTH, MAX_STEPS,
};

const COUNTER: &str = r#"
namespace Demo.Counting;

public class Counter {
    public var count = 0;
    var step = 1;

    Counter(start) { count = start; }
    Counter(start, by) {
        count = start;
        step = by;
    }

    public fn next() {
        count = count + step;
        return count;
    }

    public fn describe() { return "Counter at " + count; }

    fn reset() { count = 0; }
}

class Hidden {
    public fn secret() { return 42; }
}
"#;

fn compile_ok(source: &str) -> CompiledModule {
    let outcome = DynamicCompiler::new().compile(source, &[]);
    assert!(outcome.success, "unexpected errors: {:?}", outcome.errors);
    outcome.module.expect("successful compile carries a module")
}

/// Valid source yields a usable module and no errors.
#[test]
fn test_valid_source_compiles_to_usable_module() {
    let outcome = DynamicCompiler::new().compile(COUNTER, &[]);
    assert!(outcome.success);
    assert!(outcome.errors.is_empty());
    assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);

    let module = outcome.module.unwrap();
    let counter = InstanceFactory::create_instance(&module, "Counter", &[Value::Int(10), Value::Int(5)])
        .expect("counter instance");

    assert_eq!(counter.type_name(), "Demo.Counting.Counter");
    assert_eq!(counter.invoke("next", &[]).unwrap(), Value::Int(15));
    assert_eq!(counter.invoke("next", &[]).unwrap(), Value::Int(20));
    assert_eq!(counter.get("count").unwrap(), Value::Int(20));

    counter.set("count", 1i64).unwrap();
    assert_eq!(counter.invoke("describe", &[]).unwrap(), Value::from("Counter at 1"));
}

/// Private members are not reachable from the host.
#[test]
fn test_private_members_are_hidden() {
    let module = compile_ok(COUNTER);
    let counter = InstanceFactory::create_instance(&module, "Counter", &[Value::Int(0)]).unwrap();

    assert!(matches!(counter.get("step"), Err(RuntimeError::UnknownMember { .. })));
    assert!(matches!(counter.invoke("reset", &[]), Err(RuntimeError::UnknownMember { .. })));
    assert!(matches!(
        counter.invoke("next", &[Value::Int(1)]),
        Err(RuntimeError::ArityMismatch { .. })
    ));
}

/// An undeclared identifier fails compilation with a located error.
#[test]
fn test_undeclared_identifier_fails() {
    let outcome = DynamicCompiler::new().compile(
        "public class A {\n    public fn f() {\n        return undefinedThing * 2;\n    }\n}",
        &[],
    );

    assert!(!outcome.success);
    assert!(outcome.module.is_none());
    assert_eq!(outcome.errors.len(), 1);
    assert_eq!(outcome.errors[0].code, codes::UNDECLARED_NAME);
    assert!(outcome.errors[0].message.contains("undefinedThing"));
    assert_eq!(outcome.errors[0].location, Some(Location::new(3, 16)));
}

/// `class { garbage` is a syntax error, not a fault.
#[test]
fn test_garbage_class_is_syntax_error() {
    let outcome = DynamicCompiler::new().compile("class { garbage", &[]);

    assert!(!outcome.success);
    assert!(outcome.module.is_none());
    assert!(!outcome.errors.is_empty());
    assert!(outcome.errors.iter().any(|e| e.code == codes::SYNTAX_ERROR));
}

/// Pathological input always produces an outcome.
#[test]
fn test_pathological_sources_never_panic() {
    let bytes: Vec<u8> = (0..=255u8).cycle().take(4096).collect();
    let binary = String::from_utf8_lossy(&bytes).into_owned();

    let sources = vec![
        binary,
        "\0\0\0\u{feff}".to_string(),
        "(".repeat(100_000),
        format!("class A {{ fn f() {{ return {}1; }} }}", "(".repeat(100_000)),
        format!("class A {{ fn f() {{ {} }} }}", "{".repeat(50_000)),
        format!("class A {{ fn f() {{ return {}1; }} }}", "-".repeat(100_000)),
        format!("class A {{ fn f() {{ {} }} }}", "if (true) {} else ".repeat(10_000)),
        format!("{}class A {{}}", "namespace N { ".repeat(10_000)),
        "\"unterminated".to_string(),
        "/* unterminated".to_string(),
        "class A { var x = 99999999999999999999999; }".to_string(),
        "namespace ;;;; class".to_string(),
        "public public public".to_string(),
        "class A { A( }".to_string(),
        "}}}}{{{{".to_string(),
    ];

    let compiler = DynamicCompiler::new();
    for source in &sources {
        let outcome = compiler.compile(source, &[]);
        assert!(!outcome.success, "expected failure for {:.40?}", source);
        assert!(outcome.module.is_none());
        assert!(!outcome.errors.is_empty());
    }
}

/// Empty and whitespace-only sources compile to an empty module with a warning.
#[test]
fn test_empty_source_warns() {
    let compiler = DynamicCompiler::new();
    for source in ["", "   \n\t  ", "// only a comment"] {
        let outcome = compiler.compile(source, &[]);
        assert!(outcome.success);
        assert_eq!(outcome.warnings.len(), 1);
        assert_eq!(outcome.warnings[0].code, codes::NO_TYPES_DECLARED);
        assert!(outcome.warnings[0].location.is_none());

        let module = outcome.module.unwrap();
        assert!(InstanceFactory::list_exported_types(&module).is_empty());
    }
}

/// Warnings never block success.
#[test]
fn test_warnings_on_successful_compile() {
    let outcome = DynamicCompiler::new().compile(
        "public class A { public fn f() { var unused = 1; return 2; var late = 3; } }",
        &[],
    );

    assert!(outcome.success);
    assert!(outcome.errors.is_empty());
    let codes: Vec<&str> = outcome.warnings.iter().map(|w| w.code.as_str()).collect();
    assert_eq!(codes, vec![codes::UNREACHABLE_CODE, codes::UNUSED_LOCAL, codes::UNUSED_LOCAL]);
}

/// A missing type yields no instance rather than a fault.
#[test]
fn test_missing_type_yields_none() {
    let module = compile_ok(COUNTER);

    assert!(InstanceFactory::create_instance(&module, "X", &[]).is_none());
    assert_eq!(
        InstanceFactory::try_create_instance(&module, "X", &[]).unwrap_err(),
        InstantiationError::TypeNotFound("X".to_string())
    );
}

/// Full names reach every type; simple names only reach exported ones.
#[test]
fn test_type_resolution_order() {
    let module = compile_ok(COUNTER);

    let by_full = InstanceFactory::create_instance(&module, "Demo.Counting.Counter", &[Value::Int(1)]);
    assert!(by_full.is_some());

    let hidden = InstanceFactory::create_instance(&module, "Demo.Counting.Hidden", &[]).unwrap();
    assert_eq!(hidden.invoke("secret", &[]).unwrap(), Value::Int(42));
    assert!(InstanceFactory::create_instance(&module, "Hidden", &[]).is_none());
}

/// Constructor problems are reported as absent, with detail from the strict variant.
#[test]
fn test_construction_failures() {
    let module = compile_ok(
        r#"
        public class Guard {
            public var value;
            Guard(x) {
                if (x < 0) { throw "negative: " + x; }
                value = x;
            }
        }
        "#,
    );

    assert!(InstanceFactory::create_instance(&module, "Guard", &[]).is_none());
    assert_eq!(
        InstanceFactory::try_create_instance(&module, "Guard", &[]).unwrap_err(),
        InstantiationError::NoMatchingConstructor {
            type_name: "Guard".to_string(),
            arity: 0,
        }
    );

    assert!(InstanceFactory::create_instance(&module, "Guard", &[Value::Int(-1)]).is_none());
    match InstanceFactory::try_create_instance(&module, "Guard", &[Value::Int(-1)]) {
        Err(InstantiationError::ConstructorFailed { type_name, source }) => {
            assert_eq!(type_name, "Guard");
            assert_eq!(source, RuntimeError::Thrown("negative: -1".to_string()));
        }
        other => panic!("expected constructor failure, got {:?}", other),
    }

    let guard = InstanceFactory::create_instance(&module, "Guard", &[Value::Int(3)]).unwrap();
    assert_eq!(guard.get("value").unwrap(), Value::Int(3));
}

/// Field initialisers run in order before the constructor.
#[test]
fn test_field_initialisers_run_first() {
    let module = compile_ok(
        r#"
        public class Box {
            public var a = 1;
            public var b = a + 1;
            public var log = "";
            Box() { log = "a=" + a + ",b=" + b; }
        }
        "#,
    );

    let instance = InstanceFactory::create_instance(&module, "Box", &[]).unwrap();
    assert_eq!(instance.get("log").unwrap(), Value::from("a=1,b=2"));
}

/// Exported type descriptors list public shape only.
#[test]
fn test_list_exported_types() {
    let module = compile_ok(COUNTER);
    let types = DynamicCompiler::new().list_exported_types(&module);

    assert_eq!(types.len(), 1);
    let counter = &types[0];
    assert_eq!(counter.name, "Counter");
    assert_eq!(counter.full_name, "Demo.Counting.Counter");
    assert_eq!(counter.namespace.as_deref(), Some("Demo.Counting"));
    assert_eq!(counter.constructors, vec![1, 2]);
    assert_eq!(counter.fields, vec!["count".to_string()]);

    let methods: HashSet<(&str, usize)> = counter.methods.iter().map(|m| (m.name.as_str(), m.arity)).collect();
    assert_eq!(methods, HashSet::from([("next", 0), ("describe", 0)]));
}

/// Host libraries and baseline functions are callable from compiled code.
#[test]
fn test_native_libraries() {
    fn twice(args: &[Value]) -> Result<Value, RuntimeError> {
        match &args[0] {
            Value::Int(i) => Ok(Value::Int(i * 2)),
            other => Err(RuntimeError::TypeMismatch(other.type_name().to_string())),
        }
    }

    let host = NativeLibrary::new("Host").with_function("twice", 1, twice);
    let unit = CompilationUnit::new(
        r#"
        public class Calc {
            public fn run(x) {
                var text = Text.upper("n") + "=" + Convert.toString(Host.twice(x));
                return text + ";" + Math.max(x, 3);
            }
        }
        "#,
    )
    .with_reference(host);

    let outcome = DynamicCompiler::new().compile_unit(&unit);
    assert!(outcome.success, "{:?}", outcome.errors);
    let calc = InstanceFactory::create_instance(outcome.module.as_ref().unwrap(), "Calc", &[]).unwrap();
    assert_eq!(calc.invoke("run", &[Value::Int(5)]).unwrap(), Value::from("N=10;5"));
}

/// Types of a referenced module can be constructed by the referencing module.
#[test]
fn test_module_references() {
    let compiler = DynamicCompiler::new();
    let geometry = compile_ok(
        r#"
        namespace Geo;
        public class Point {
            public var x;
            public var y;
            Point(a, b) { x = a; y = b; }
            public fn sum() { return x + y; }
        }
        "#,
    );

    let app_source = r#"
        public class App {
            public fn run() {
                var p = new Geo.Point(2, 3);
                return p.sum() + p.x;
            }
        }
    "#;
    let outcome = compiler.compile(app_source, &[ModuleReference::from(geometry.clone())]);
    assert!(outcome.success, "{:?}", outcome.errors);
    let app_module = outcome.module.unwrap();
    let app = InstanceFactory::create_instance(&app_module, "App", &[]).unwrap();
    assert_eq!(app.invoke("run", &[]).unwrap(), Value::Int(7));

    geometry.unload();
    assert_eq!(
        app.invoke("run", &[]),
        Err(RuntimeError::ModuleUnloaded(geometry.name().to_string()))
    );

    let again = compiler.compile(app_source, &[ModuleReference::from(geometry)]);
    assert!(!again.success);
    assert_eq!(again.warnings[0].code, codes::UNLOADED_REFERENCE);
    assert_eq!(again.errors[0].code, codes::TYPE_NOT_FOUND);
}

/// Unloading one module leaves independent modules untouched.
#[test]
fn test_unload_is_isolated() {
    let first = compile_ok(COUNTER);
    let second = compile_ok(COUNTER);
    assert_ne!(first.name(), second.name());

    let live = InstanceFactory::create_instance(&first, "Counter", &[Value::Int(0)]).unwrap();
    assert!(first.unload());
    assert!(!first.is_loaded());

    assert!(InstanceFactory::create_instance(&first, "Counter", &[Value::Int(0)]).is_none());
    assert_eq!(
        InstanceFactory::try_create_instance(&first, "Counter", &[Value::Int(0)]).unwrap_err(),
        InstantiationError::Unloaded(first.name().to_string())
    );
    assert!(matches!(live.invoke("next", &[]), Err(RuntimeError::ModuleUnloaded(_))));

    let other = InstanceFactory::create_instance(&second, "Counter", &[Value::Int(0)]).unwrap();
    assert_eq!(other.invoke("next", &[]).unwrap(), Value::Int(1));
}

/// Runaway code is stopped by the step budget and the call depth limit.
#[test]
fn test_execution_limits() {
    let module = compile_ok(
        r#"
        public class Runaway {
            public fn spin() { while (true) { } }
            public fn recurse(n) { return recurse(n + 1); }
        }
        "#,
    );
    let runaway = InstanceFactory::create_instance(&module, "Runaway", &[]).unwrap();

    assert_eq!(runaway.invoke("spin", &[]), Err(RuntimeError::StepLimitExceeded(MAX_STEPS)));
    assert_eq!(
        runaway.invoke("recurse", &[Value::Int(0)]),
        Err(RuntimeError::RecursionLimitExceeded(MAX_CALL_DEPTH))
    );
}

/// Recursion up to the call depth limit runs to completion.
#[test]
fn test_recursion_within_depth_limit() {
    let module = compile_ok(
        r#"
        public class Walker {
            public fn down(n) {
                if (n == 0) { return 0; }
                return 1 + down(n - 1);
            }
        }
        "#,
    );
    let walker = InstanceFactory::create_instance(&module, "Walker", &[]).unwrap();

    let deepest = (MAX_CALL_DEPTH - 1) as i64;
    assert_eq!(walker.invoke("down", &[Value::Int(50)]).unwrap(), Value::Int(50));
    assert_eq!(walker.invoke("down", &[Value::Int(deepest)]).unwrap(), Value::Int(deepest));
    assert_eq!(
        walker.invoke("down", &[Value::Int(deepest + 1)]),
        Err(RuntimeError::RecursionLimitExceeded(MAX_CALL_DEPTH))
    );
}

/// Long operator, member and else-if chains are not nesting.
#[test]
fn test_long_chains_compile_and_run() {
    let terms: Vec<String> = (0..100).map(|n| n.to_string()).collect();
    let adds: String = (1..=100).map(|n| format!(".add({})", n)).collect();
    let arms: String = (1..100)
        .map(|n| format!(" else if (n == {}) {{ return {}; }}", n, n * 10))
        .collect();
    let source = format!(
        r#"
        public class Chains {{
            public fn sum() {{ return {}; }}
            public fn build() {{ return new Builder().reset(){}.total; }}
            public fn pick(n) {{ if (n == 0) {{ return 0; }}{} else {{ return -1; }} }}
            public fn gate(a, b, c) {{ return a && b || c && !a; }}
        }}

        public class Builder {{
            public var total = 0;
            public fn reset() {{ total = 0; return this; }}
            public fn add(n) {{ total = total + n; return this; }}
        }}
        "#,
        terms.join(" + "),
        adds,
        arms,
    );
    let module = compile_ok(&source);
    let chains = InstanceFactory::create_instance(&module, "Chains", &[]).unwrap();

    assert_eq!(chains.invoke("sum", &[]).unwrap(), Value::Int(4950));
    assert_eq!(chains.invoke("build", &[]).unwrap(), Value::Int(5050));
    assert_eq!(chains.invoke("pick", &[Value::Int(73)]).unwrap(), Value::Int(730));
    assert_eq!(chains.invoke("pick", &[Value::Int(500)]).unwrap(), Value::Int(-1));

    let gate = |a, b, c| chains.invoke("gate", &[Value::Bool(a), Value::Bool(b), Value::Bool(c)]);
    assert_eq!(gate(true, true, false).unwrap(), Value::Bool(true));
    assert_eq!(gate(true, false, true).unwrap(), Value::Bool(false));
    assert_eq!(gate(false, false, true).unwrap(), Value::Bool(true));

    let long_sum = format!("public class A {{ public fn f() {{ return 1{}; }} }}", " + 1".repeat(100_000));
    let module = compile_ok(&long_sum);
    let a = InstanceFactory::create_instance(&module, "A", &[]).unwrap();
    assert_eq!(a.invoke("f", &[]).unwrap(), Value::Int(100_001));
}

/// Code nested close to the syntax limit still emits and loads.
#[test]
fn test_deeply_nested_code_loads() {
    let depth = 40;
    let source = format!(
        "public class Deep {{ public fn f() {{ {} return 7; {} return 0; }} }}",
        "if (true) { ".repeat(depth),
        "} ".repeat(depth),
    );
    let module = compile_ok(&source);
    let deep = InstanceFactory::create_instance(&module, "Deep", &[]).unwrap();
    assert_eq!(deep.invoke("f", &[]).unwrap(), Value::Int(7));
}

/// Instances are usable across threads and concurrent compiles never collide.
#[test]
fn test_concurrent_compiles() {
    let compiler = Arc::new(DynamicCompiler::new());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let compiler = Arc::clone(&compiler);
            std::thread::spawn(move || {
                let outcome = compiler.compile(COUNTER, &[]);
                let module = outcome.module.expect("module");
                let counter = InstanceFactory::create_instance(&module, "Counter", &[Value::Int(i)]).unwrap();
                assert_eq!(counter.invoke("next", &[]).unwrap(), Value::Int(i + 1));
                module.name().to_string()
            })
        })
        .collect();

    let names: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(names.len(), 8);
}

/// Compilation can be moved off an async runtime's worker threads.
#[tokio::test]
async fn test_compile_on_blocking_pool() {
    let outcome = tokio::task::spawn_blocking(|| DynamicCompiler::new().compile(COUNTER, &[]))
        .await
        .unwrap();
    assert!(outcome.success);
}
