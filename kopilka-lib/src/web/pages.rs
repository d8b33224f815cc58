use maud::{html, Markup, DOCTYPE};

/// Common page frame. Styling is a small embedded sheet, there is no
/// static asset pipeline.
pub fn base(title: &str, content: Markup) -> Markup {
    html! {
        (DOCTYPE)
        html lang="ru" {
            head {
                meta charset="UTF-8";
                meta name="viewport" content="width=device-width, initial-scale=1.0";
                title { (title) " — Копилка" }
                style { (STYLE) }
            }
            body {
                main { (content) }
            }
        }
    }
}

pub fn navigation() -> Markup {
    html! {
        nav {
            a href="/transactions" { "Транзакции" }
            " | "
            a href="/transactions/add" { "Добавить" }
            " | "
            form method="post" action="/auth/logout" class="inline" {
                button type="submit" class="link" { "Выйти" }
            }
        }
    }
}

pub fn error_banner(message: Option<&str>) -> Markup {
    html! {
        @if let Some(message) = message {
            p class="error" { (message) }
        }
    }
}

const STYLE: &str = r#"
body { font-family: sans-serif; max-width: 56rem; margin: 0 auto; padding: 1rem; }
nav { margin-bottom: 1rem; }
table { border-collapse: collapse; width: 100%; }
th, td { border: 1px solid #ccc; padding: 0.4rem 0.6rem; text-align: left; }
.error { color: #b00020; }
.income { color: #1b5e20; }
.expense { color: #b00020; }
.inline { display: inline; }
button.link { background: none; border: none; color: #1a0dab; cursor: pointer; padding: 0; font-size: inherit; text-decoration: underline; }
form.stack label { display: block; margin-top: 0.6rem; }
img.receipt { max-width: 24rem; display: block; margin-top: 0.6rem; }
"#;
