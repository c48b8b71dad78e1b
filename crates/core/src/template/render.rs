//! Per-channel message rendering.

use super::TemplateContext;
use crate::channel::ChannelType;

/// Render the dispatch message in the format the channel expects.
///
/// Telegram gets legacy Markdown, email gets a full HTML document, SMS and push
/// get plain text.
pub fn render_for_channel(channel: ChannelType, ctx: &TemplateContext) -> String {
    match channel {
        ChannelType::Telegram => render_telegram(ctx),
        ChannelType::Email => render_email(ctx),
        ChannelType::Sms | ChannelType::Push => render_plain(ctx),
    }
}

/// Email subject line for a route assignment.
pub fn email_subject(route_name: &str, route_date: &str) -> String {
    format!("Route Assignment: {} - {}", route_name, route_date)
}

fn escape_markdown(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn escape_html(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn time_window(start: &str, end: &str) -> String {
    match (start.is_empty(), end.is_empty()) {
        (false, false) => format!("{} - {}", start, end),
        (false, true) => start.to_string(),
        (true, false) => format!("until {}", end),
        (true, true) => String::new(),
    }
}

fn render_telegram(ctx: &TemplateContext) -> String {
    let md = |s: &str| escape_markdown(s);
    let mut out = String::new();

    out.push_str(&format!("🚚 *New Route Assignment*\n\nHi {},\n\n", md(&ctx.driver.full_name)));
    out.push_str(&format!("*Route:* {}", md(&ctx.route.name)));
    if !ctx.route.code.is_empty() {
        out.push_str(&format!(" ({})", md(&ctx.route.code)));
    }
    out.push('\n');
    out.push_str(&format!("*Date:* {}\n", md(&ctx.route.date)));

    let window = time_window(&ctx.route.planned_start_time, &ctx.route.planned_end_time);
    if !window.is_empty() {
        out.push_str(&format!("*Time:* {}\n", md(&window)));
    }
    out.push_str(&format!(
        "*Stops:* {} | *Distance:* {:.1} km | *Duration:* {} min\n",
        ctx.route.total_stops, ctx.route.total_distance_km, ctx.route.total_duration_minutes
    ));

    if let Some(ref vehicle) = ctx.vehicle {
        out.push_str(&format!("*Vehicle:* {}", md(&vehicle.name)));
        if !vehicle.license_plate.is_empty() {
            out.push_str(&format!(" ({})", md(&vehicle.license_plate)));
        }
        out.push('\n');
    }

    if !ctx.bookings.is_empty() {
        out.push_str("\n*Stops*\n");
        for booking in &ctx.bookings {
            out.push_str(&format!(
                "{}. *{}*\n   {}\n",
                booking.stop_number,
                md(&booking.client_name),
                md(&booking.address)
            ));
            if !booking.scheduled_time.is_empty() {
                out.push_str(&format!("   ⏰ {}\n", md(&booking.scheduled_time)));
            }
            if !booking.services.is_empty() {
                out.push_str(&format!("   🔧 {}\n", md(&booking.services)));
            }
            if !booking.special_instructions.is_empty() {
                out.push_str(&format!("   📝 {}\n", md(&booking.special_instructions)));
            }
        }
    }

    // URLs go inside link syntax unescaped
    out.push_str(&format!("\n[View route map]({})\n", ctx.route_maps_url));
    out.push_str(&format!("\n_Dispatched at {}_", md(&ctx.dispatched_at)));
    out
}

fn render_email(ctx: &TemplateContext) -> String {
    let h = |s: &str| escape_html(s);
    let mut out = String::new();

    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str(&format!(
        "<title>{}</title>\n</head>\n<body>\n",
        h(&email_subject(&ctx.route.name, &ctx.route.date))
    ));
    out.push_str(&format!("<h1>New Route Assignment</h1>\n<p>Hi {},</p>\n", h(&ctx.driver.full_name)));
    out.push_str("<p>You have been assigned the following route:</p>\n<table>\n");

    let mut row = |label: &str, value: &str| {
        if !value.is_empty() {
            out.push_str(&format!("<tr><th align=\"left\">{}</th><td>{}</td></tr>\n", label, h(value)));
        }
    };
    row("Route", &ctx.route.name);
    row("Code", &ctx.route.code);
    row("Date", &ctx.route.date);
    row(
        "Time",
        &time_window(&ctx.route.planned_start_time, &ctx.route.planned_end_time),
    );
    row("Stops", &ctx.route.total_stops.to_string());
    row("Distance", &format!("{:.1} km", ctx.route.total_distance_km));
    row("Duration", &format!("{} min", ctx.route.total_duration_minutes));
    if let Some(ref vehicle) = ctx.vehicle {
        let description = [vehicle.name.as_str(), vehicle.make.as_str(), vehicle.model.as_str()]
            .iter()
            .filter(|s| !s.is_empty())
            .copied()
            .collect::<Vec<_>>()
            .join(" ");
        row("Vehicle", &description);
        row("License plate", &vehicle.license_plate);
    }
    out.push_str("</table>\n");

    if !ctx.bookings.is_empty() {
        out.push_str("<h2>Stops</h2>\n<ol>\n");
        for booking in &ctx.bookings {
            out.push_str(&format!(
                "<li value=\"{}\"><strong>{}</strong><br>{}",
                booking.stop_number,
                h(&booking.client_name),
                h(&booking.address)
            ));
            if !booking.scheduled_time.is_empty() {
                out.push_str(&format!("<br>Scheduled: {}", h(&booking.scheduled_time)));
            }
            if !booking.services.is_empty() {
                out.push_str(&format!("<br>Services: {}", h(&booking.services)));
            }
            if !booking.special_instructions.is_empty() {
                out.push_str(&format!("<br>Notes: {}", h(&booking.special_instructions)));
            }
            if !booking.maps_url.is_empty() {
                out.push_str(&format!("<br><a href=\"{}\">Directions</a>", h(&booking.maps_url)));
            }
            out.push_str("</li>\n");
        }
        out.push_str("</ol>\n");
    }

    out.push_str(&format!(
        "<p><a href=\"{}\">View route map</a></p>\n<p><small>Dispatched at {}</small></p>\n</body>\n</html>\n",
        h(&ctx.route_maps_url),
        h(&ctx.dispatched_at)
    ));
    out
}

fn render_plain(ctx: &TemplateContext) -> String {
    let mut out = format!(
        "Hi {}, you are assigned route {} on {}",
        ctx.driver.full_name, ctx.route.name, ctx.route.date
    );
    let window = time_window(&ctx.route.planned_start_time, &ctx.route.planned_end_time);
    if !window.is_empty() {
        out.push_str(&format!(" ({})", window));
    }
    out.push_str(&format!(
        ", {} stops. Map: {}",
        ctx.route.total_stops, ctx.route_maps_url
    ));
    out
}
