//! The named CSP examples
//!
//! Each example is an async body run as the root task of its own group. It
//! builds a pipeline from [`Producers`] and the CSP combinators, drains it,
//! and reports every received value through the context's logger.

use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use paradigms_csp::{flat_map, go, map, merge, timeout, Alts, Channel, Recv};
use tracing::debug;

use crate::errors::{RuntimeError, RuntimeResult};
use crate::producers::Producers;
use crate::sink::SharedLogger;

// ----------------------------------------------------------------------------
// Example Registry
// ----------------------------------------------------------------------------

/// Everything an example body needs
#[derive(Clone)]
pub struct ExampleContext {
    pub producers: Producers,
    pub logger: SharedLogger,
    pub race_timeout: Duration,
}

impl ExampleContext {
    fn log(&self, line: &str) {
        self.logger.log(line);
    }
}

type ExampleBody = fn(ExampleContext) -> BoxFuture<'static, ()>;

/// A runnable, named example
pub struct Example {
    pub title: &'static str,
    pub slug: &'static str,
    pub summary: &'static str,
    body: ExampleBody,
}

impl std::fmt::Debug for Example {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Example")
            .field("title", &self.title)
            .field("slug", &self.slug)
            .finish()
    }
}

impl Example {
    /// Body future for one run of this example
    pub fn start(&self, context: ExampleContext) -> BoxFuture<'static, ()> {
        (self.body)(context)
    }
}

static EXAMPLES: [Example; 5] = [
    Example {
        title: "Intro to CSP",
        slug: "intro-to-csp",
        summary: "Drain a paced number producer until it closes",
        body: |ctx| intro_to_csp(ctx).boxed(),
    },
    Example {
        title: "Get Movies (CSP)",
        slug: "get-movies-csp",
        summary: "One consumer task per category, no completion signal",
        body: |ctx| get_movies(ctx).boxed(),
    },
    Example {
        title: "Get Movies with Indicator (CSP)",
        slug: "get-movies-with-indicator-csp",
        summary: "Per-category relays merged into one stream with a finish line",
        body: |ctx| get_movies_with_indicator(ctx).boxed(),
    },
    Example {
        title: "Get Movies with Indicator (FRP style CSP)",
        slug: "get-movies-with-indicator-frp-style-csp",
        summary: "flat_map over categories, map over movies",
        body: |ctx| get_movies_frp_style(ctx).boxed(),
    },
    Example {
        title: "Get Movies with Timeout (CSP)",
        slug: "get-movies-with-timeout-csp",
        summary: "Each category races its movie stream against a timer",
        body: |ctx| get_movies_with_timeout(ctx).boxed(),
    },
];

/// Every example, in tutorial order
pub fn all() -> &'static [Example] {
    &EXAMPLES
}

/// Look an example up by exact title or by slug
pub fn find(name: &str) -> RuntimeResult<&'static Example> {
    EXAMPLES
        .iter()
        .find(|example| example.title == name || example.slug == name)
        .ok_or_else(|| RuntimeError::UnknownExample(name.to_string()))
}

// ----------------------------------------------------------------------------
// Example Bodies
// ----------------------------------------------------------------------------

async fn intro_to_csp(ctx: ExampleContext) {
    let numbers = ctx.producers.numbers(1, 10);
    while let Recv::Value(number) = numbers.recv().await {
        ctx.log(&format!("Got number from channel: {}", number));
    }
    ctx.log("Channel closed.");
}

async fn get_movies(ctx: ExampleContext) {
    let categories = ctx.producers.categories();
    while let Recv::Value(category) = categories.recv().await {
        let ctx = ctx.clone();
        go(async move {
            let movies = ctx.producers.items_in_category(&category);
            while let Recv::Value(movie) = movies.recv().await {
                ctx.log(&format!("{} - {}", category, movie));
            }
        });
    }
}

async fn get_movies_with_indicator(ctx: ExampleContext) {
    ctx.log("Starting loading...");

    let categories = ctx.producers.categories();
    let mut relays = Vec::new();
    while let Recv::Value(category) = categories.recv().await {
        let out = Channel::unbuffered();
        relays.push(out.clone());

        let producers = ctx.producers.clone();
        go(async move {
            let movies = producers.items_in_category(&category);
            while let Recv::Value(movie) = movies.recv().await {
                out.send((category.clone(), movie)).await;
            }
            out.close();
        });
    }

    let merged = merge(relays);
    while let Recv::Value((category, movie)) = merged.recv().await {
        ctx.log(&format!("{} - {}", category, movie));
    }

    ctx.log("Loading finished.");
}

async fn get_movies_frp_style(ctx: ExampleContext) {
    ctx.log("Started loading...");

    let producers = ctx.producers.clone();
    let movies = flat_map(
        move |category: String| {
            let source = producers.items_in_category(&category);
            map(move |movie| (category.clone(), movie), source)
        },
        ctx.producers.categories(),
    );
    while let Recv::Value((category, movie)) = movies.recv().await {
        ctx.log(&format!("{} - {}", category, movie));
    }

    ctx.log("Loading finished.");
}

enum Race {
    Movie(Recv<(String, String)>),
    TimedOut,
}

async fn get_movies_with_timeout(ctx: ExampleContext) {
    ctx.log("Started loading...");

    let race_ctx = ctx.clone();
    let movies = flat_map(
        move |category: String| race_category(race_ctx.clone(), category),
        ctx.producers.categories(),
    );
    while let Recv::Value((category, movie)) = movies.recv().await {
        ctx.log(&format!("{} - {}", category, movie));
    }

    ctx.log("Loading finished.");
}

/// Relay the movies of `category` until the stream closes or the race timer
/// fires. A category that loses the race is abandoned: its producer stays
/// parked.
fn race_category(ctx: ExampleContext, category: String) -> Channel<(String, String)> {
    let out = Channel::unbuffered();
    let tx = out.clone();
    go(async move {
        let name = category.clone();
        let movies = map(
            move |movie| (name.clone(), movie),
            ctx.producers.items_in_category(&category),
        );
        let timer = timeout(ctx.race_timeout);

        loop {
            let selected = Alts::new()
                .recv(&movies, Race::Movie)
                .recv(&timer, |_| Race::TimedOut)
                .await;
            match selected.value {
                Race::Movie(Recv::Value(pair)) => tx.send(pair).await,
                Race::Movie(Recv::Closed) => break,
                Race::TimedOut => {
                    debug!(category = %category, timer = %selected.channel, "race lost to timer");
                    ctx.log(&format!("{} - Timed out!", category));
                    break;
                }
            }
        }
        tx.close();
    });
    out
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_by_title_and_slug() {
        assert_eq!(find("Intro to CSP").unwrap().slug, "intro-to-csp");
        assert_eq!(
            find("get-movies-with-timeout-csp").unwrap().title,
            "Get Movies with Timeout (CSP)"
        );
        assert!(matches!(
            find("Intro to FRP"),
            Err(RuntimeError::UnknownExample(name)) if name == "Intro to FRP"
        ));
    }

    #[test]
    fn test_slugs_are_unique() {
        let mut slugs: Vec<_> = all().iter().map(|example| example.slug).collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), all().len());
    }
}
