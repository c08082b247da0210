use anyhow::Context;
use std::path::Path;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use crate::quiz::{Phase, QuizSession, QuizSource, QuizView};

const LETTERS: [char; 4] = ['A', 'B', 'C', 'D'];

// Terminal front end for the quiz state machine
pub async fn run<S: QuizSource + ?Sized>(source: &S, file: &Path) -> anyhow::Result<()> {
    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;
    let mut input = BufReader::new(tokio::io::stdin()).lines();
    let mut view = QuizView::Loading;

    loop {
        if matches!(view, QuizView::Loading) {
            println!("Generating quiz...");
            view.regenerate(source, &content).await;
        }

        let next = match &mut view {
            QuizView::Loading => continue,
            QuizView::Error(message) => {
                println!("Could not build a quiz: {message}");
                prompt_line(&mut input, "[r]etry or [q]uit? ").await?
            }
            QuizView::Ready(session) => {
                if !play(session, &mut input).await? {
                    // input closed mid-quiz
                    return Ok(());
                }
                println!(
                    "Quiz complete: {}/{} correct ({}%)",
                    session.score(),
                    session.questions().len(),
                    session.percentage().unwrap_or(0)
                );
                prompt_line(&mut input, "[r]estart, [n]ew quiz or [q]uit? ").await?
            }
        };

        match next.as_deref().map(str::trim) {
            None | Some("q") => return Ok(()),
            Some("r") => {
                if let Some(session) = view.session_mut() {
                    session.restart();
                    continue;
                }
                view = QuizView::Loading;
            }
            Some("n") => view = QuizView::Loading,
            Some(other) => println!("Unknown choice '{other}'"),
        }
    }
}

// Plays until the quiz completes (true) or input runs out (false)
async fn play<R>(session: &mut QuizSession, input: &mut Lines<R>) -> anyhow::Result<bool>
where
    R: AsyncBufRead + Unpin,
{
    while let Phase::Answering(_) = session.phase() {
        let Some(question) = session.current_question().cloned() else {
            break;
        };
        println!(
            "\nQuestion {}/{}: {}",
            session.current_index() + 1,
            session.questions().len(),
            question.question
        );
        for (letter, option) in LETTERS.iter().zip(&question.options) {
            println!("  {letter}) {option}");
        }

        let Some(line) = prompt_line(input, "Your answer: ").await? else {
            return Ok(false);
        };
        let choice = line.trim().to_ascii_uppercase();
        let picked = LETTERS
            .iter()
            .position(|l| choice.starts_with(*l))
            .and_then(|i| question.options.get(i));
        let Some(option) = picked else {
            println!("Pick one of A, B, C or D");
            continue;
        };

        session.select_option(option);
        if let Some(selected) = session.selected_option() {
            println!("You picked: {selected}");
        }
        match session.check_answer() {
            Some(true) => println!("Correct!"),
            Some(false) => println!("Wrong, the answer was: {}", question.correct_answer),
            None => continue,
        }
        session.advance();
    }
    Ok(session.phase() == Phase::Completed)
}

async fn prompt_line<R>(input: &mut Lines<R>, prompt: &str) -> anyhow::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    print!("{prompt}");
    std::io::Write::flush(&mut std::io::stdout())?;
    Ok(input.next_line().await?)
}
