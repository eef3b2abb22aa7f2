//! Templates shipped with the service

pub(super) const CUSTOMER_CONFIRMATION: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>Your Moving Quote #{{quote_id}} - {{business.name}}</title>
    <style>
      body { font-family: Arial, sans-serif; color: #1f2933; }
      .header { background: #1d4ed8; color: #ffffff; padding: 16px; }
      .content { padding: 16px; }
      .footer { color: #6b7280; font-size: 12px; padding: 16px; }
    </style>
  </head>
  <body>
    <div class="header"><h1>{{business.name}}</h1></div>
    <div class="content">
      <p>Hi {{customer.name}},</p>
      <p>Thanks for requesting a moving quote. Your reference number is <strong>#{{quote_id}}</strong>.</p>
      <h2>Your move</h2>
      <ul>
        <li>From: {{customer.moving_from}}</li>
        <li>To: {{customer.moving_to}}</li>
        {{#if customer.moving_date}}<li>Date: {{customer.moving_date}}</li>{{/if}}
        {{#if customer.home_size}}<li>Home size: {{customer.home_size}}</li>{{/if}}
      </ul>
      {{#if customer.additional_services}}
      <h2>Additional services</h2>
      <ul>
        {{#each customer.additional_services}}<li>{{this}}</li>{{/each}}
      </ul>
      {{/if}}
      <p>One of our move coordinators will contact you within one business day.
      If you have questions in the meantime, call us at {{business.phone}}.</p>
    </div>
    <div class="footer">
      <p>{{business.name}} | {{business.phone}} | <a href="{{business.website}}">{{business.website}}</a></p>
    </div>
  </body>
</html>
"#;

pub(super) const BUSINESS_NOTIFICATION: &str = r#"<!DOCTYPE html>
<html>
  <head>
    <meta charset="utf-8" />
    <title>New Quote Request #{{quote_id}} from {{customer.name}}</title>
    <style>
      body { font-family: Arial, sans-serif; color: #1f2933; }
      td { padding: 4px 8px; }
    </style>
  </head>
  <body>
    <h1>New quote request #{{quote_id}}</h1>
    <table>
      <tr><td><strong>Name</strong></td><td>{{customer.name}}</td></tr>
      <tr><td><strong>Email</strong></td><td><a href="mailto:{{customer.email}}">{{customer.email}}</a></td></tr>
      {{#if customer.phone}}<tr><td><strong>Phone</strong></td><td><a href="tel:{{customer.phone}}">{{customer.phone}}</a></td></tr>{{/if}}
      <tr><td><strong>From</strong></td><td>{{customer.moving_from}}</td></tr>
      <tr><td><strong>To</strong></td><td>{{customer.moving_to}}</td></tr>
      {{#if customer.moving_date}}<tr><td><strong>Date</strong></td><td>{{customer.moving_date}}</td></tr>{{/if}}
      {{#if customer.home_size}}<tr><td><strong>Home size</strong></td><td>{{customer.home_size}}</td></tr>{{/if}}
      {{#if customer.additional_services}}<tr><td><strong>Services</strong></td><td>{{#each customer.additional_services}}{{this}}{{#unless @last}}, {{/unless}}{{/each}}</td></tr>{{/if}}
      {{#if customer.notes}}<tr><td><strong>Notes</strong></td><td>{{customer.notes}}</td></tr>{{/if}}
    </table>
  </body>
</html>
"#;
