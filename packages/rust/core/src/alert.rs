//! Alert and notice composition (Telegram HTML).

use chrono::{DateTime, Local, TimeZone};
use html_escape::encode_text;

use alphawatch_net::OutboundMessage;
use alphawatch_shared::{AnnouncementRecord, SENTINEL};

/// Alert for a newly detected announcement, stamped with `detected_at`.
pub fn compose_alert<Tz: TimeZone>(
    record: &AnnouncementRecord,
    page_url: &str,
    button_text: &str,
    detected_at: &DateTime<Tz>,
) -> OutboundMessage
where
    Tz::Offset: std::fmt::Display,
{
    let spend = match record.spend_tier() {
        Some(points) => format!("{points} баллов"),
        None => SENTINEL.to_string(),
    };

    let text = format!(
        "🚨 <b>ВЫШЕЛ НОВЫЙ AIRDROP!</b> 🚨\n\n\
         💰 <b>Монета:</b> {project}\n\
         🎯 <b>Условия для участия:</b> {points} баллов\n\
         💸 <b>Трата баллов:</b> {spend}\n\
         ⏰ <b>Обнаружен:</b> {time}\n\n\
         ⚡ Скорее беги забирать!\n\
         🔗 {url}\n\n\
         #Airdrop #BinanceAlpha",
        project = encode_text(&record.project),
        points = encode_text(&record.required_points),
        time = detected_at.format("%H:%M:%S"),
        url = encode_text(page_url),
    );

    OutboundMessage::text(text).with_button(button_text, page_url)
}

/// [`compose_alert`] stamped with the local wall clock.
pub fn compose_alert_now(
    record: &AnnouncementRecord,
    page_url: &str,
    button_text: &str,
) -> OutboundMessage {
    compose_alert(record, page_url, button_text, &Local::now())
}

/// Startup notice sent once before the first poll.
pub fn startup_notice(recipients: usize) -> OutboundMessage {
    OutboundMessage::text(format!(
        "🤖 <b>Бот запущен и работает!</b>\n\
         Мониторинг Binance Alpha активирован.\n\
         Получатели: {recipients}"
    ))
}
