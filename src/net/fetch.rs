use crate::net::Response;

// Loads an URL with the given client and returns the response in a result if any.
// Cookies are sent and stored by whatever cookie provider the client was built with.
pub async fn fetch(client: &reqwest::Client, url: &str) -> Result<Response, reqwest::Error> {
    let res = client.get(url).send().await?;

    // Fetch results
    let final_url = res.url().clone();
    let status = res.status().as_u16();
    let status_text = res.status().canonical_reason().unwrap_or("Unknown").to_string();
    let headers = res.headers().clone();

    // Fetch body. We don't do streaming yet
    let body = res.bytes().await?.to_vec();

    log::debug!("Fetched {} ({} {}, {} bytes)", final_url, status, status_text, body.len());

    Ok(Response {
        url: final_url,
        status,
        status_text,
        headers,
        body,
    })
}
