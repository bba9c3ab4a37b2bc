use console::Style;

use crate::mutants::Mutation;
use crate::search::ProbeOutcome;
use crate::state::{PatchArtifact, RunSummary};

pub fn print_error(msg: &str) {
    let style = Style::new().red().bold();
    eprintln!("{} {}", style.apply_to("✗"), msg);
}

pub fn print_success(msg: &str) {
    let style = Style::new().green().bold();
    println!("{} {}", style.apply_to("✓"), msg);
}

pub fn print_candidate(candidate: usize, total: usize) {
    let style = Style::new().cyan().bold();
    println!("{}", style.apply_to(format!("Candidate {candidate}/{total}")));
}

pub fn print_generation(generation: usize, total: usize) {
    println!("  Generation {generation}/{total}");
}

pub fn print_mutation(mutation: &Mutation) {
    let dim = Style::new().dim();
    for line in mutation.to_string().lines() {
        println!("    {}", dim.apply_to(line));
    }
}

pub fn print_compile_failed() {
    let style = Style::new().yellow();
    println!("    {} did not compile", style.apply_to("·"));
}

pub fn print_compiled() {
    let style = Style::new().green();
    println!("    {} compiled", style.apply_to("·"));
}

pub fn print_tests(status: i32) {
    if status > 0 {
        let style = Style::new().green().bold();
        println!("    {} tests passed", style.apply_to("✓"));
    } else {
        let style = Style::new().yellow();
        println!("    {} tests ran, no fix yet", style.apply_to("·"));
    }
}

pub fn print_patch(artifact: &PatchArtifact) {
    let style = Style::new().green().bold();
    println!(
        "{} patch written to {}",
        style.apply_to("✓"),
        artifact.patch_file,
    );
}

pub fn print_probe(outcome: &ProbeOutcome) {
    match outcome.tests {
        None => print_error(&format!(
            "Unmodified program does not compile (status {}).",
            outcome.compile
        )),
        Some(tests) if tests > 0 => print_success("Unmodified program compiles and its tests pass."),
        Some(tests) => {
            let style = Style::new().yellow().bold();
            println!(
                "{} Unmodified program compiles; tests do not pass (status {}).",
                style.apply_to("!"),
                tests
            );
        }
    }
}

pub fn print_summary(summary: &RunSummary) {
    let secs = summary.duration_ms as f64 / 1000.0;
    println!();
    if summary.patches.is_empty() {
        let style = Style::new().yellow().bold();
        println!(
            "{} no patch found in {} candidates ({} compilations, {} test runs) in {:.1}s",
            style.apply_to("!"),
            summary.candidates_run,
            summary.compilations,
            summary.test_runs,
            secs,
        );
    } else {
        let style = Style::new().green().bold();
        println!(
            "{} {} patches from {} candidates ({} compilations, {} test runs) in {:.1}s",
            style.apply_to("✓"),
            summary.patches.len(),
            summary.candidates_run,
            summary.compilations,
            summary.test_runs,
            secs,
        );
    }
    if summary.candidates_failed > 0 {
        let dim = Style::new().dim();
        println!(
            "  {} {} candidates aborted on errors",
            dim.apply_to("·"),
            summary.candidates_failed
        );
    }
    print_patch_list(&summary.patches);
}

pub fn print_status(summary: &RunSummary) {
    println!(
        "Last run ({}): {} candidates, {} failed, {} patches",
        summary.started,
        summary.candidates_run,
        summary.candidates_failed,
        summary.patches.len(),
    );
    print_patch_list(&summary.patches);
}

fn print_patch_list(patches: &[PatchArtifact]) {
    if patches.is_empty() {
        return;
    }
    println!();
    let ref_style = Style::new().cyan().bold();
    let dim = Style::new().dim();
    for patch in patches {
        println!(
            "  {} {} {}",
            ref_style.apply_to(format!("C{}G{}", patch.candidate, patch.generation)),
            patch.patch_file,
            dim.apply_to(format!("[{} mutations]", patch.mutations.len())),
        );
    }
}
