use mimic::config::{BotConfig, ConfigSource, Respond, Rule};
use mimic::{Engine, Explanation, Tier};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

pub fn print_explanation(explanation: &Explanation, color: bool) {
    let palette = ansi::Palette::new(color);
    println!(
        "\n{}",
        palette.bold(palette.paint(
            format!("⚙  Resolving ({} · {}): \"{}\"", explanation.endpoint, explanation.model, explanation.input),
            ansi::CYAN
        ))
    );

    // Matching summary
    println!("\n{}", palette.paint("━━━ Matching ━━━", ansi::GRAY));
    let matcher = &explanation.metrics.matcher;
    println!(
        "  {} {}  {} {}  {} {}  {} {}",
        palette.dim("considered:"),
        palette.paint(matcher.considered.to_string(), ansi::YELLOW),
        palette.dim("structural:"),
        palette.paint(matcher.structural.to_string(), ansi::YELLOW),
        palette.dim("gated out:"),
        palette.paint(matcher.gated_out.to_string(), ansi::YELLOW),
        palette.dim("superseded:"),
        palette.paint(matcher.superseded.to_string(), ansi::YELLOW),
    );
    println!("  {} {}", palette.paint("Tier:", ansi::BLUE), fmt_tier(explanation.metrics.tier, &palette));

    // Outcome
    println!("\n{}", palette.paint("━━━ Outcome ━━━", ansi::GRAY));
    match &explanation.outcome {
        Err(err) => {
            let payload = &err.0;
            println!(
                "  {} {} {}",
                palette.bold(palette.paint(format!("✗ {}", payload.status), ansi::RED)),
                palette.paint(&payload.code, ansi::YELLOW),
                palette.dim(&payload.message),
            );
        }
        Ok(resolved) => {
            if let Some(rule) = &resolved.rule {
                println!("  {} {}", palette.dim("rule:"), palette.paint(rule, ansi::CYAN));
            }
            for (idx, tool) in resolved.prefix_tools.iter().enumerate() {
                println!(
                    "  {} {} {}",
                    palette.paint(format!("[tool {idx}]"), ansi::GRAY),
                    palette.paint(&tool.kind, ansi::BLUE),
                    palette.dim(format!("{} · {}", tool.status, tool.id)),
                );
            }
            println!("  {}", palette.bold(palette.paint(&resolved.text, ansi::GREEN)));
            for annotation in &resolved.annotations {
                println!(
                    "    {} {} {}",
                    palette.paint(&annotation.kind, ansi::YELLOW),
                    annotation.title,
                    palette.dim(annotation.url.as_deref().unwrap_or("")),
                );
            }
            println!(
                "  {} {}  {} {}",
                palette.dim("chunks:"),
                mimic::chunks(&resolved.text).count(),
                palette.dim("delay:"),
                palette.paint(format!("{:?}", resolved.delay), ansi::CYAN),
            );
        }
    }

    // Timing
    println!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    println!(
        "  Total: {}  │  Matching: {}",
        palette.paint(format!("{:?}", explanation.metrics.total), ansi::GREEN),
        palette.paint(format!("{:?}", explanation.metrics.matching), ansi::CYAN),
    );
    println!();
}

pub fn print_rules(engine: &Engine, source: &ConfigSource, color: bool) {
    let palette = ansi::Palette::new(color);
    let config = engine.config();

    let origin = match source {
        ConfigSource::File(path) => path.display().to_string(),
        ConfigSource::Builtin => "built-in default".to_string(),
    };
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Configuration: {origin}"), ansi::CYAN)));
    print_settings(config, &palette);

    println!("\n{}", palette.paint("━━━ Tools ━━━", ansi::GRAY));
    for (name, definition, enabled) in engine.tools().entries() {
        let mark = if enabled { palette.paint("✓", ansi::GREEN) } else { palette.dim("✗") };
        let citations = definition.message.as_ref().map_or(0, |m| m.annotations.len());
        println!(
            "  {} {} {}",
            mark,
            palette.paint(name, ansi::BLUE),
            palette.dim(format!("{} · {} · {} citations", definition.call_type, definition.status, citations)),
        );
    }

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    if config.rules.is_empty() {
        println!("{}", palette.dim("  No rules configured"));
    }
    for (idx, rule) in config.rules.iter().enumerate() {
        let name = if rule.id.is_empty() { "(unnamed)" } else { rule.id.as_str() };
        println!(
            "  {} {} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            palette.bold(palette.paint(name, ansi::CYAN)),
            palette.dim("│"),
            palette.paint(describe_match(rule), ansi::YELLOW),
        );
        println!(
            "      {} {}  {} {:?}{}",
            palette.dim("respond:"),
            palette.paint(describe_respond(&rule.respond), ansi::GREEN),
            palette.dim("│ delay:"),
            config.rule_delay(rule),
            palette.dim(describe_flags(rule)),
        );
    }

    let fallback = describe_respond(&config.fallback);
    println!("\n  {} {}", palette.dim("fallback:"), palette.paint(fallback, ansi::GREEN));
    println!();
}

fn print_settings(config: &BotConfig, palette: &ansi::Palette) {
    println!("\n{}", palette.paint("━━━ Server ━━━", ansi::GRAY));
    println!(
        "  port {}  │  cors {}  │  streaming {} ({:?}/chunk)  │  history {} turns",
        palette.paint(config.port().to_string(), ansi::YELLOW),
        palette.paint(config.server.cors.as_deref().unwrap_or("*"), ansi::YELLOW),
        palette.paint(if config.streaming_enabled() { "on" } else { "off" }, ansi::YELLOW),
        config.chunk_delay(),
        config.history.max_turns,
    );
    let models: Vec<String> = config.models_or_default().into_iter().map(|m| m.id).collect();
    println!("  models {}", palette.paint(models.join(", "), ansi::BLUE));
}

fn describe_match(rule: &Rule) -> String {
    let filter = &rule.r#match;
    let mut parts = Vec::new();
    if let Some(endpoint) = filter.endpoint {
        parts.push(format!("endpoint={endpoint}"));
    }
    if !filter.model.0.is_empty() {
        parts.push(format!("model={}", filter.model.0.join("|")));
    }
    if let Some(role) = &filter.role {
        parts.push(format!("role={role}"));
    }
    if !filter.contains.is_empty() {
        parts.push(format!("contains={:?}", filter.contains));
    }
    if let Some(regex) = &filter.regex {
        parts.push(format!("regex=/{regex}/"));
    }
    if parts.is_empty() { "any request".to_string() } else { parts.join(" ") }
}

fn describe_respond(respond: &Respond) -> String {
    if let Some(error) = &respond.error {
        return format!("error {} {}", error.status, error.code);
    }
    let mut parts = Vec::new();
    if !respond.choose.is_empty() {
        parts.push(format!("choose×{}", respond.choose.len()));
    } else if !respond.text.is_empty() {
        parts.push(format!("{:?}", preview(&respond.text)));
    }
    if !respond.message.text.is_empty() {
        parts.push(format!("message {:?}", preview(&respond.message.text)));
    }
    if !respond.use_tools.is_empty() {
        parts.push(format!("tools {}", respond.use_tools.join("+")));
    }
    if !respond.tools.is_empty() {
        parts.push(format!("stubs×{}", respond.tools.len()));
    }
    if parts.is_empty() { "(empty)".to_string() } else { parts.join(" ") }
}

fn describe_flags(rule: &Rule) -> String {
    let mut flags = String::new();
    if rule.r#continue {
        flags.push_str("  continue");
    }
    if let Some(p) = rule.probability {
        flags.push_str(&format!("  p={p}"));
    }
    flags
}

fn preview(text: &str) -> String {
    let mut out: String = text.chars().take(48).collect();
    if out.len() < text.len() {
        out.push('…');
    }
    out
}

fn fmt_tier(tier: Tier, palette: &ansi::Palette) -> String {
    let color = match tier {
        Tier::Rule => ansi::GREEN,
        Tier::Injected => ansi::RED,
        Tier::Fallback | Tier::Legacy => ansi::YELLOW,
        Tier::Builtin | Tier::Unresolved => ansi::GRAY,
    };
    palette.paint(tier.as_str(), color)
}
