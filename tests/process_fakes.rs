//! Integration tests for faking, recording and asserting on processes
//! through the public API.

use artisan::process::{Factory, FakeProcessResult, PendingProcess, ProcessError};

#[test]
fn explicit_patterns_win_over_the_catch_all() {
    let factory = Factory::new();
    factory.fake_for([
        ("*", factory.result("anything", "", 0)),
        ("git status", factory.result("clean", "", 0)),
        ("git *", factory.result("git output", "", 0)),
    ]);

    assert_eq!(factory.run("git status").unwrap().output(), "clean\n");
    assert_eq!(factory.run("git log --oneline").unwrap().output(), "git output\n");
    assert_eq!(factory.run("ls").unwrap().output(), "anything\n");
    factory.assert_ran_times(|_, _| true, 3);
}

#[test]
fn sequences_answer_in_order_then_fail() {
    let factory = Factory::new();
    factory.fake_for([("deploy", factory.sequence([factory.result("first", "", 0), factory.result("", "boom", 1)]))]);

    assert_eq!(factory.run("deploy").unwrap().output(), "first\n");
    let failed = factory.run("deploy").unwrap();
    assert!(failed.failed());
    assert_eq!(failed.error_output(), "boom\n");
    assert!(matches!(factory.run("deploy"), Err(ProcessError::SequenceExhausted)));
}

#[test]
fn described_processes_stream_output_while_polled() {
    let factory = Factory::new();
    factory.fake_for([(
        "tail log",
        factory.describe().output("one").output("two").error_output("oops").exit_code(2).iterations(3),
    )]);

    let mut process = factory.start("tail log").unwrap();
    let mut polls = 0;
    while process.running() {
        polls += 1;
    }
    assert_eq!(polls, 3);
    let result = process.wait().unwrap();
    assert_eq!(result.output(), "one\ntwo\n");
    assert_eq!(result.error_output(), "oops\n");
    assert_eq!(result.exit_code(), Some(2));
}

#[test]
fn closures_see_the_pending_process() {
    let factory = Factory::new();
    factory.fake_using(|process: &PendingProcess| {
        let dir = process.working_directory().map(|path| path.display().to_string()).unwrap_or_default();
        FakeProcessResult::default().with_output(dir)
    });

    let result = factory.path("/srv/app").command("pwd").run().unwrap();
    assert_eq!(result.output(), "/srv/app\n");
    factory.assert_ran(|process, result| process.command_line() == "pwd" && result.successful());
}

#[test]
fn stray_processes_are_refused() {
    let factory = Factory::new();
    factory.fake_for([("php artisan migrate", FakeProcessResult::default())]);
    factory.prevent_stray_processes(true);

    assert!(factory.run("php artisan migrate").is_ok());
    let err = factory.run("rm -rf storage").unwrap_err();
    assert_eq!(err.to_string(), "attempted process [rm -rf storage] without a matching fake");
    factory.assert_did_not_run(|process, _| process.command_line() == "rm -rf storage");
}

#[test]
fn pools_return_results_by_key() {
    let factory = Factory::new();
    factory.fake_for([("first", factory.result("1", "", 0)), ("second", factory.result("2", "", 1))]);

    let results = factory
        .concurrently(|pool| {
            pool.command("first");
            pool.add_as("named", |process| process.command("second"));
        })
        .unwrap();

    assert_eq!(results[0].output(), "1\n");
    assert_eq!(results["named"].output(), "2\n");
    assert!(results.failed());
    factory.assert_ran_times(|_, _| true, 2);
}

#[test]
fn nothing_is_recorded_without_recording() {
    let factory = Factory::new();
    factory.run("true").unwrap();
    factory.assert_nothing_ran();
}

#[test]
#[should_panic(expected = "An expected process was not invoked.")]
fn assert_ran_fails_when_nothing_matches() {
    let factory = Factory::new();
    factory.fake();
    factory.run("ls").unwrap();
    factory.assert_ran(|process, _| process.command_line() == "pwd");
}
