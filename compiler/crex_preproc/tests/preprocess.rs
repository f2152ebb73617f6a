//! End-to-end preprocessor tests over in-memory translation units.

use crex_diagnostic::{DiagnosticQueue, Severity};
use crex_lexer::TokenKind;
use crex_preproc::{MemoryLoader, PreprocError, TranslationUnit};
use pretty_assertions::assert_eq;

/// Build a unit whose root is the first file in `files`.
fn unit_for(files: &[(&str, &str)]) -> TranslationUnit {
    let mut loader = MemoryLoader::new();
    for &(path, contents) in files {
        loader.insert(path, contents);
    }
    TranslationUnit::open_with(files[0].0, Box::new(loader), DiagnosticQueue::quiet())
        .expect("root file opens")
}

/// Preprocess a single in-memory file.
fn preprocess(src: &str) -> (Result<(), PreprocError>, TranslationUnit) {
    let mut unit = unit_for(&[("main.c", src)]);
    let result = unit.parse();
    (result, unit)
}

/// The emitted stream without whitespace, comments, or newlines.
fn significant(unit: &TranslationUnit) -> Vec<(TokenKind, String)> {
    unit.output()
        .iter()
        .filter(|t| !t.kind.is_trivia() && t.kind != TokenKind::Newline)
        .map(|t| (t.kind, t.text.clone()))
        .collect()
}

fn texts(sig: &[(TokenKind, String)]) -> Vec<&str> {
    sig.iter().map(|(_, t)| t.as_str()).collect()
}

// === Plain source lines ===

#[test]
fn passthrough_without_directives() {
    let (result, unit) = preprocess("int x = 1;\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["int", "x", "=", "1", ";"]);
    assert!(!unit.diagnostics().has_errors());
}

#[test]
fn whitespace_and_comments_are_echoed() {
    let (result, unit) = preprocess("a /* c */ b\n");
    assert!(result.is_ok());
    let kinds: Vec<TokenKind> = unit.output().iter().map(|t| t.kind).collect();
    assert!(kinds.contains(&TokenKind::Comment));
    assert!(kinds.contains(&TokenKind::Whitespace));
}

#[test]
fn badchar_in_live_code_is_fatal() {
    let (result, unit) = preprocess("int @ x;\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().has_errors());
}

// === #define and replacement ===

#[test]
fn object_macro_replaces_identifier() {
    let (result, unit) = preprocess("#define N 42\nint x = N;\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["int", "x", "=", "42", ";"]);
}

#[test]
fn macro_bodies_are_whitespace_normalized() {
    let (result, unit) = preprocess("#define M  a   /* c */   b  \nM\n");
    assert!(result.is_ok());
    let out: Vec<&str> = unit
        .output()
        .iter()
        .filter(|t| t.kind != TokenKind::Newline)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(out, ["a", " ", "b"]);
}

#[test]
fn spliced_define_body_spans_lines() {
    let (result, unit) = preprocess("#define A 1 \\\n + 2\nA\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["1", "+", "2"]);
}

#[test]
fn define_name_may_be_a_keyword() {
    let (result, unit) = preprocess("#define int long\nint x;\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["long", "x", ";"]);
}

#[test]
fn missing_macro_name_is_fatal() {
    let (result, unit) = preprocess("#define\n");
    assert!(result.is_err());
    let diag = &unit.diagnostics().diagnostics()[0];
    assert!(diag.message.contains("missing macro name"));
}

#[test]
fn function_macro_substitutes_parameters() {
    let (result, unit) = preprocess("#define dbl(x) x+x\ndbl(3)\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["3", "+", "3"]);
}

#[test]
fn function_macro_without_arguments_is_verbatim() {
    let (result, unit) = preprocess("#define f(x) y\nf;\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["f", ";"]);
}

#[test]
fn function_macro_arguments_nest() {
    let (result, unit) = preprocess("#define first(a,b) a\nfirst(g(1,2),3)\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["g", "(", "1", ",", "2", ")"]);
}

#[test]
fn variadic_macro_binds_remainder() {
    let (result, unit) = preprocess("#define v(a,...) a __VA_ARGS__\nv(1,2,3)\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["1", "2", ",", "3"]);
}

#[test]
fn wrong_arity_is_fatal() {
    let (result, unit) = preprocess("#define f(a,b) a\nf(1)\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("expects 2 argument(s)"));
}

#[test]
fn duplicate_parameter_is_fatal() {
    let (result, unit) = preprocess("#define f(a,a) a\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("duplicate macro parameter"));
}

#[test]
fn unclosed_parameter_list_is_fatal() {
    let (result, unit) = preprocess("#define f(a,\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("expected ')'"));
}

#[test]
fn stringize_operator() {
    let (result, unit) = preprocess("#define s(x) # x\ns(abc)\n");
    assert!(result.is_ok());
    let sig = significant(&unit);
    assert_eq!(sig, [(TokenKind::StringLit, "\"abc\"".to_string())]);
}

#[test]
fn token_paste_operator() {
    let (result, unit) = preprocess("#define cat(a,b) a##b\ncat(do,ne)\n");
    assert!(result.is_ok());
    assert_eq!(
        significant(&unit),
        [(TokenKind::Identifier, "done".to_string())]
    );
}

#[test]
fn scenario_s4_paste_without_rescan() {
    let src = "#define FOO() 123\n#define concat(a,b) a##b\nconcat(FO,O)()\n";
    let (result, unit) = preprocess(src);
    assert!(result.is_ok());
    // The paste produces FOO, and without a rescan the following () is
    // emitted verbatim rather than invoking FOO.
    assert_eq!(texts(&significant(&unit)), ["FOO", "(", ")"]);
}

// === Redefinition (invariant 3) ===

#[test]
fn equal_redefinition_succeeds() {
    let (result, _) = preprocess("#define X 1\n#define X 1\nX\n");
    assert!(result.is_ok());
}

#[test]
fn equal_redefinition_modulo_whitespace_succeeds() {
    let (result, _) = preprocess("#define X a  b\n#define X  a /* c */ b\n");
    assert!(result.is_ok());
}

#[test]
fn differing_redefinition_is_fatal() {
    let (result, unit) = preprocess("#define X 1\n#define X 2\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("redefined"));
}

// === #undef ===

#[test]
fn undef_removes_definition() {
    let (result, unit) = preprocess("#define N 1\n#undef N\nN\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["N"]);
}

#[test]
fn undef_of_unknown_name_is_quiet() {
    let (result, unit) = preprocess("#undef NEVER_DEFINED\n");
    assert!(result.is_ok());
    assert!(!unit.diagnostics().has_errors());
}

// === Conditionals ===

#[test]
fn ifdef_keeps_branch_when_defined() {
    let (result, unit) = preprocess("#define Y 1\n#ifdef Y\nkept\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["kept"]);
}

#[test]
fn ifdef_skips_branch_when_undefined() {
    let (result, unit) = preprocess("#ifdef NOPE\ndropped\n#endif\nafter\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["after"]);
}

#[test]
fn ifndef_inverts() {
    let (result, unit) = preprocess("#ifndef NOPE\nkept\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["kept"]);
}

#[test]
fn else_branch_of_failed_condition_is_parsed() {
    let (result, unit) = preprocess("#ifdef NOPE\na\n#else\nb\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["b"]);
}

#[test]
fn else_branch_of_taken_condition_is_skipped() {
    let (result, unit) = preprocess("#define Y 1\n#ifdef Y\na\n#else\nb\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["a"]);
}

#[test]
fn elif_chain_takes_first_true_branch() {
    let (result, unit) = preprocess("#if 0\na\n#elif 1\nb\n#else\nc\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["b"]);
}

#[test]
fn elif_after_taken_branch_is_skipped_unevaluated() {
    // The second branch's condition would be an error if evaluated.
    let (result, unit) = preprocess("#if 1\na\n#elif x + y\nb\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["a"]);
}

#[test]
fn nested_conditionals_skip_as_a_unit() {
    let src = "#ifdef NOPE\n#ifdef ALSO_NOPE\na\n#else\nb\n#endif\nc\n#endif\nd\n";
    let (result, unit) = preprocess(src);
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["d"]);
}

#[test]
fn nested_else_does_not_leak_into_outer_skip() {
    // The inner #else belongs to the inner group; the outer group has
    // everything skipped.
    let src = "#ifdef NOPE\n#ifdef X\n#else\ninner\n#endif\n#else\nouter\n#endif\n";
    let (result, unit) = preprocess(src);
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["outer"]);
}

#[test]
fn skipped_sections_tolerate_bad_bytes() {
    let (result, unit) = preprocess("#ifdef NOPE\n@ $$ @\n#endif\nok\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["ok"]);
}

#[test]
fn skipped_sections_do_not_define_macros() {
    let (result, unit) = preprocess("#ifdef NOPE\n#define X 1\n#endif\nX\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["X"]);
    assert!(unit.macros().lookup("X").is_none());
}

#[test]
fn scenario_s5_else_of_undefined() {
    let src = "#ifdef NOTDEFINED\n#error X\n#else\n#warning Y\n#endif\n";
    let (result, unit) = preprocess(src);
    assert!(result.is_ok(), "warning is not fatal");
    let diags = unit.diagnostics();
    assert_eq!(diags.warning_count(), 1);
    assert_eq!(diags.error_count(), 0);
    let warning = &diags.diagnostics()[0];
    assert_eq!(warning.severity, Severity::Warning);
    assert_eq!(warning.message, "Y");
}

#[test]
fn scenario_s6_else_without_if() {
    let (result, unit) = preprocess("#else\n");
    assert!(result.is_err());
    let diag = &unit.diagnostics().diagnostics()[0];
    assert_eq!(diag.message, "#else without #if");
}

#[test]
fn endif_without_if_is_fatal() {
    let (result, unit) = preprocess("x\n#endif\n");
    assert!(result.is_err());
    assert_eq!(
        unit.diagnostics().diagnostics()[0].message,
        "#endif without #if"
    );
}

#[test]
fn double_else_is_fatal() {
    let (result, unit) = preprocess("#ifdef NOPE\n#else\n#else\n#endif\n");
    assert!(result.is_err());
    assert_eq!(
        unit.diagnostics().diagnostics()[0].message,
        "#else after #else"
    );
}

#[test]
fn double_else_in_kept_branch_is_fatal() {
    let (result, unit) = preprocess("#ifndef NOPE\na\n#else\n#else\n#endif\n");
    assert!(result.is_err());
    assert_eq!(
        unit.diagnostics().diagnostics()[0].message,
        "#else after #else"
    );
}

#[test]
fn unterminated_if_is_fatal() {
    let (result, unit) = preprocess("#ifdef NOPE\nx\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("unterminated #if"));
}

#[test]
fn conditional_balance_every_if_has_one_endif() {
    // Three opens, three closes, all kept.
    let src = "#ifndef A\n#ifndef B\n#ifndef C\nx\n#endif\n#endif\n#endif\n";
    let (result, unit) = preprocess(src);
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["x"]);

    let (result, _) = preprocess("#ifndef A\nx\n#endif\n#endif\n");
    assert!(result.is_err(), "extra #endif must fail");
}

// === #if conditions ===

#[test]
fn if_integer_literals() {
    let (result, unit) = preprocess("#if 1\na\n#endif\n#if 0\nb\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["a"]);
}

#[test]
fn if_defined_forms() {
    let src = "#define X 1\n#if defined(X)\na\n#endif\n#if defined X\nb\n#endif\n#if defined(Y)\nc\n#endif\n";
    let (result, unit) = preprocess(src);
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["a", "b"]);
}

#[test]
fn if_negated_defined() {
    let (result, unit) = preprocess("#if !defined(NOPE)\na\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["a"]);
}

#[test]
fn if_identifier_expands_through_macro() {
    let (result, unit) = preprocess("#define ON 1\n#if ON\na\n#endif\n#if OFF\nb\n#endif\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["a"]);
}

#[test]
fn if_unsupported_expression_is_fatal() {
    let (result, unit) = preprocess("#if 1 + 2\na\n#endif\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("unsupported #if expression"));
}

// === #include ===

#[test]
fn include_splices_file_into_stream() {
    let mut unit = unit_for(&[
        ("main.c", "before\n#include \"inc.h\"\nafter\n"),
        ("inc.h", "middle\n"),
    ]);
    assert!(unit.parse().is_ok());
    assert_eq!(texts(&significant(&unit)), ["before", "middle", "after"]);
}

#[test]
fn included_macros_are_visible_afterwards() {
    let mut unit = unit_for(&[
        ("main.c", "#include \"defs.h\"\nVALUE\n"),
        ("defs.h", "#define VALUE 7\n"),
    ]);
    assert!(unit.parse().is_ok());
    assert_eq!(texts(&significant(&unit)), ["7"]);
}

#[test]
fn include_diagnostics_use_the_included_path() {
    let mut unit = unit_for(&[
        ("main.c", "#include \"bad.h\"\n"),
        ("bad.h", "\n#error boom\n"),
    ]);
    assert!(unit.parse().is_err());
    let diag = &unit.diagnostics().diagnostics()[0];
    assert_eq!(diag.path.to_str(), Some("bad.h"));
    assert_eq!(diag.line, 2);
    assert_eq!(diag.message, "boom");
}

#[test]
fn missing_include_is_fatal() {
    let (result, unit) = preprocess("#include \"nowhere.h\"\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("cannot open"));
}

#[test]
fn include_cycle_hits_depth_limit() {
    let mut unit = unit_for(&[("loop.h", "#include \"loop.h\"\n")]);
    assert!(unit.parse().is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("nested too deeply"));
}

#[test]
fn angle_bracket_include_uses_loader_too() {
    let mut unit = unit_for(&[
        ("main.c", "#include <sys.h>\nX\n"),
        ("sys.h", "#define X 9\n"),
    ]);
    assert!(unit.parse().is_ok());
    assert_eq!(texts(&significant(&unit)), ["9"]);
}

// === #line ===

#[test]
fn line_directive_renumbers() {
    let (result, unit) = preprocess("#line 100\nx\n");
    assert!(result.is_ok());
    let x = unit
        .output()
        .iter()
        .find(|t| t.text == "x")
        .expect("x emitted");
    assert_eq!(x.line, 100);
}

#[test]
fn line_directive_renames_file_for_diagnostics() {
    let (result, unit) = preprocess("#line 5 \"virtual.c\"\n#error stop\n");
    assert!(result.is_err());
    let diag = &unit.diagnostics().diagnostics()[0];
    assert_eq!(diag.path.to_str(), Some("virtual.c"));
    assert_eq!(diag.line, 5);
}

#[test]
fn line_directive_requires_a_number() {
    let (result, unit) = preprocess("#line foo\n");
    assert!(result.is_err());
    assert!(unit.diagnostics().diagnostics()[0]
        .message
        .contains("line number"));
}

// === #error / #warning / #pragma / null ===

#[test]
fn error_directive_is_fatal_with_message() {
    let (result, unit) = preprocess("#error something broke\n");
    assert!(result.is_err());
    let diag = &unit.diagnostics().diagnostics()[0];
    assert_eq!(diag.severity, Severity::Error);
    assert_eq!(diag.message, "something broke");
}

#[test]
fn warning_directive_continues() {
    let (result, unit) = preprocess("#warning heads up\nx\n");
    assert!(result.is_ok());
    assert_eq!(unit.diagnostics().warning_count(), 1);
    assert_eq!(texts(&significant(&unit)), ["x"]);
}

#[test]
fn pragma_is_ignored() {
    let (result, unit) = preprocess("#pragma once whatever\nx\n");
    assert!(result.is_ok());
    assert!(!unit.diagnostics().has_errors());
    assert_eq!(texts(&significant(&unit)), ["x"]);
}

#[test]
fn null_directive_is_a_no_op() {
    let (result, unit) = preprocess("#\nx\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["x"]);
}

#[test]
fn directive_name_may_follow_comments_after_pound() {
    // From the original's test corpus: `# /* ... */ define name body`.
    let (result, unit) = preprocess("# /*\n\n*/ define foobar 1\nfoobar\n");
    assert!(result.is_ok());
    assert_eq!(texts(&significant(&unit)), ["1"]);
}

#[test]
fn unknown_directive_is_fatal() {
    let (result, unit) = preprocess("#bogus\n");
    assert!(result.is_err());
    assert_eq!(
        unit.diagnostics().diagnostics()[0].message,
        "invalid preprocessing directive"
    );
}

// === Diagnostic format ===

#[test]
fn diagnostics_carry_path_line_col() {
    let (result, unit) = preprocess("\n\n#error late\n");
    assert!(result.is_err());
    let diag = &unit.diagnostics().diagnostics()[0];
    assert_eq!(diag.to_string(), "main.c:3:1: late");
}
