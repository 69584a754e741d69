//! Plain-text output for the terminal.

use mentor_client::DashboardSummary;
use mentor_types::{Essay, Feedback, Page, User, WordCountBand};

const COMPETENCES: [&str; 5] = [
    "Formal written language",
    "Understanding the prompt",
    "Organizing arguments",
    "Cohesion",
    "Intervention proposal",
];

pub fn user(user: &User) {
    println!("{} <{}>", user.name, user.email);
    println!("  role: {:?}", user.role);
    if let Some(grade) = &user.school_grade {
        println!("  grade: {grade}");
    }
    if let Some(goals) = &user.study_goals {
        println!("  goals: {goals}");
    }
}

pub fn essays(essays: &[Essay]) {
    if essays.is_empty() {
        println!("No essays.");
        return;
    }
    for essay in essays {
        println!(
            "#{:<6} {:<10} {:>4}w  {}  {}",
            essay.id,
            essay.status,
            essay.word_count(),
            essay.updated_at.format("%Y-%m-%d %H:%M"),
            essay.title
        );
    }
}

pub fn page(page: &Page<Essay>) {
    essays(&page.content);
    println!(
        "page {}/{} ({} essays)",
        page.number + 1,
        page.total_pages.max(1),
        page.total_elements
    );
}

pub fn band(words: u32) -> &'static str {
    match WordCountBand::for_count(words) {
        WordCountBand::TooShort => "too short",
        WordCountBand::Short => "a bit short",
        WordCountBand::Ideal => "ideal length",
        WordCountBand::Long => "long",
    }
}

pub fn feedback(essay: &Essay, feedback: &Feedback) {
    println!("{}", essay.title);
    match feedback.overall_score {
        Some(score) => println!("Score: {score}/{}", Feedback::MAX_OVERALL_SCORE),
        None => println!("Score: n/a"),
    }
    let comments = feedback.competence_comments();
    for (i, (name, score)) in COMPETENCES
        .iter()
        .zip(feedback.competence_scores())
        .enumerate()
    {
        let score = score.map_or_else(|| "-".to_string(), |s| s.to_string());
        println!("  C{} {:<28} {:>3}/{}", i + 1, name, score, Feedback::MAX_COMPETENCE_SCORE);
        if let Some(comment) = comments[i] {
            println!("      {comment}");
        }
    }
    if !feedback.general_comment.is_empty() {
        println!();
        println!("{}", feedback.general_comment);
    }
    if let Some(suggestions) = &feedback.suggestions {
        println!();
        println!("Suggestions: {suggestions}");
    }
}

pub fn dashboard(summary: &DashboardSummary) {
    println!("{} essays in total", summary.total_essays);
    match &summary.stats {
        Some(stats) => println!(
            "average score {:.0} over {} feedbacks",
            stats.average_score, stats.feedback_count
        ),
        None => println!("score statistics unavailable"),
    }
    println!();
    println!("Recent:");
    essays(&summary.recent);
}
